/// An `a=` attribute. `value` is `None` for flag attributes (`a=recvonly`)
/// and `Some` for `name:value` attributes (`a=rtpmap:0 PCMU/8000`).
///
/// Attributes are kept in a `Vec`, not a `HashMap`, because a session or
/// media block can legally repeat an attribute name (multiple `a=rtpmap`
/// lines); the round-trip guarantee only promises map-like (unordered)
/// equality, not that insertion order survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn flag(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: Some(value.into()) }
    }
}

/// `o=username sess-id sess-version nettype addrtype address`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub sess_id: String,
    pub sess_version: String,
    pub nettype: String,
    pub addrtype: String,
    pub address: String,
}

/// `c=nettype addrtype address`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub nettype: String,
    pub addrtype: String,
    pub address: String,
}

/// `b=bwtype:value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bandwidth {
    pub bwtype: String,
    pub value: u64,
}

/// `t=start-time stop-time`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub start: u64,
    pub stop: u64,
}

/// One `m=` block and everything that rebinds under it until the next
/// `m=` line or end of message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media: String,
    pub port: u32,
    pub port_count: Option<u32>,
    pub proto: String,
    pub formats: Vec<String>,
    pub connection: Option<Connection>,
    pub bandwidth: Vec<Bandwidth>,
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    /// The `a=sendrecv`/`sendonly`/`recvonly`/`inactive` direction
    /// attribute for this media block, if present.
    pub fn direction(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| {
                a.value.is_none()
                    && matches!(a.name.as_str(), "sendrecv" | "sendonly" | "recvonly" | "inactive")
            })
            .map(|a| a.name.as_str())
    }
}

/// A fully parsed SDP session description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub version: String,
    pub origin: Origin,
    pub session_name: String,
    pub info: Option<String>,
    pub uri: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub connection: Option<Connection>,
    pub bandwidth: Vec<Bandwidth>,
    pub timing: Vec<Timing>,
    pub attributes: Vec<Attribute>,
    pub media: Vec<MediaDescription>,
}

impl SessionDescription {
    /// Compares two session descriptions for the round-trip law's notion
    /// of equality: every field equal, but attribute *maps* (session-level
    /// and per-media) compared as unordered multisets rather than
    /// position-for-position.
    pub fn field_equal(&self, other: &Self) -> bool {
        self.version == other.version
            && self.origin == other.origin
            && self.session_name == other.session_name
            && self.info == other.info
            && self.uri == other.uri
            && self.email == other.email
            && self.phone == other.phone
            && self.connection == other.connection
            && sorted(&self.bandwidth) == sorted(&other.bandwidth)
            && self.timing == other.timing
            && sorted_attrs(&self.attributes) == sorted_attrs(&other.attributes)
            && self.media.len() == other.media.len()
            && self
                .media
                .iter()
                .zip(other.media.iter())
                .all(|(a, b)| media_field_equal(a, b))
    }
}

fn media_field_equal(a: &MediaDescription, b: &MediaDescription) -> bool {
    a.media == b.media
        && a.port == b.port
        && a.port_count == b.port_count
        && a.proto == b.proto
        && a.formats == b.formats
        && a.connection == b.connection
        && sorted(&a.bandwidth) == sorted(&b.bandwidth)
        && sorted_attrs(&a.attributes) == sorted_attrs(&b.attributes)
}

fn sorted(bw: &[Bandwidth]) -> Vec<(String, u64)> {
    let mut v: Vec<_> = bw.iter().map(|b| (b.bwtype.clone(), b.value)).collect();
    v.sort();
    v
}

fn sorted_attrs(attrs: &[Attribute]) -> Vec<(String, Option<String>)> {
    let mut v: Vec<_> = attrs.iter().map(|a| (a.name.clone(), a.value.clone())).collect();
    v.sort();
    v
}
