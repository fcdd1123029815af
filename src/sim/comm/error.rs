/// Transport-level failures surfaced by fabric endpoints.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The destination rank is not part of this fabric.
    UnknownPeer(usize),
    /// The peer's endpoint has been dropped and its queue is drained.
    ChannelClosed(usize),
    /// A fixed-size record was shorter (or longer) than its layout.
    TruncatedRecord,
    /// An archived control payload failed validation.
    BadPayload,
}
