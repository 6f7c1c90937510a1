//! A minimal SIP request/response model.
//!
//! The wire parser and serializer are external collaborators (see the
//! core's design document, §6) — this crate does not parse bytes off the
//! network. It exists because the header codec, validation pipeline, and
//! B2BUA engine all need *some* concrete shape to pass requests and
//! responses around in, and the real parser's `Message` type is out of
//! scope. `Request` and `Response` here mirror the accessor surface the
//! parser collaborator is expected to produce: a method/status line, a
//! case-insensitive ordered multi-value header map, and a raw body.

mod headers;
mod method;
mod request;
mod response;

pub use headers::{HeaderMap, HeaderName};
pub use method::Method;
pub use request::Request;
pub use response::Response;

/// Either side of a request/response exchange.
///
/// Components that need to treat both uniformly (the validation pipeline's
/// `AppliesTo` predicate, for instance) match on this rather than taking
/// two separate parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Message::Request(r) => &r.headers,
            Message::Response(r) => &r.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        match self {
            Message::Request(r) => &mut r.headers,
            Message::Response(r) => &mut r.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(r) => &r.body,
            Message::Response(r) => &r.body,
        }
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Message::Request(r) => Some(r),
            Message::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Request(_) => None,
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}
