//! Shared error vocabulary.
//!
//! Nothing in this crate panics on a host-supplied bad line; fallible
//! operations return one of these small `Copy` enums, and the dispatcher
//! (`protocol::dispatch`) is the single place that turns them into the wire
//! `NAK <CMD> <CODE>` vocabulary.

/// The `<CODE>` half of a `NAK <CMD> <CODE>` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
pub enum NakCode {
    /// Bad argument count or value.
    Arg,
    /// Slot-pool underflow (pool full).
    Ufl,
    /// No frame currently being loaded.
    Nfm,
    /// Frame already full.
    Ofl,
    /// No animation currently being loaded.
    Noa,
    /// Unparseable line.
    Lin,
    /// Line too long.
    Ltl,
    /// Unknown command.
    Cmd,
}

impl NakCode {
    /// The three-or-four letter token used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            NakCode::Arg => "ARG",
            NakCode::Ufl => "UFL",
            NakCode::Nfm => "NFM",
            NakCode::Ofl => "OFL",
            NakCode::Noa => "NOA",
            NakCode::Lin => "LIN",
            NakCode::Ltl => "LTL",
            NakCode::Cmd => "CMD",
        }
    }
}

/// Failures from `frame::Frame::load_hex`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
pub enum FrameError {
    /// A character outside `0-9A-F` (case-insensitive) was found.
    BadHex,
    /// The frame is already full; no bytes were appended.
    Full,
}

impl From<FrameError> for NakCode {
    fn from(e: FrameError) -> NakCode {
        match e {
            FrameError::BadHex => NakCode::Arg,
            FrameError::Full => NakCode::Ofl,
        }
    }
}

/// Failures from `pool::AnimationPool` operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
pub enum PoolError {
    /// Both pools, or the relevant one, have no free slots.
    Full,
    /// No animation is currently being loaded.
    NoAnimationLoading,
}

impl From<PoolError> for NakCode {
    fn from(e: PoolError) -> NakCode {
        match e {
            PoolError::Full => NakCode::Ufl,
            PoolError::NoAnimationLoading => NakCode::Noa,
        }
    }
}
