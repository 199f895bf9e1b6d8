//! Opaque pagination cursor.
//!
//! A [`Cursor`] marks a position in the newest-first traversal of a store:
//! the `(month_stamp, seq)` of the last row a page returned. The next page
//! starts strictly after it. The token format is `"{month_stamp}_{seq}"`;
//! callers must treat it as opaque so the store's internal row numbering
//! can change without breaking clients.
//!
//! A cursor is only meaningful against the store that produced it.

use annals_types::MonthStamp;

/// Position in the `(month_stamp DESC, seq DESC)` traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    month_stamp: MonthStamp,
    seq: i64,
}

/// Rejection reason for a malformed cursor token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// The token is not of the form `{month_stamp}_{seq}`.
    #[error("malformed cursor {0:?}: expected <month_stamp>_<seq>")]
    Shape(String),

    /// One of the two components is not an integer.
    #[error("malformed cursor {token:?}: {part} is not an integer")]
    NotNumeric {
        /// The full token.
        token: String,
        /// Which component failed to parse.
        part: &'static str,
    },
}

impl Cursor {
    /// Position just past the row `(month_stamp, seq)`.
    pub const fn new(month_stamp: MonthStamp, seq: i64) -> Self {
        Self { month_stamp, seq }
    }

    /// Simulation month of the last row of the page.
    pub const fn month_stamp(&self) -> MonthStamp {
        self.month_stamp
    }

    /// Insertion sequence of the last row of the page.
    pub const fn seq(&self) -> i64 {
        self.seq
    }

    /// Serialize to the wire token.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a wire token.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        // Split on the last underscore so a negative month stamp stays intact.
        let (month, seq) = token
            .rsplit_once('_')
            .ok_or_else(|| CursorError::Shape(token.to_owned()))?;
        if month.is_empty() || seq.is_empty() {
            return Err(CursorError::Shape(token.to_owned()));
        }
        let month_stamp = month.parse::<i64>().map_err(|_parse| CursorError::NotNumeric {
            token: token.to_owned(),
            part: "month_stamp",
        })?;
        let seq = seq.parse::<i64>().map_err(|_parse| CursorError::NotNumeric {
            token: token.to_owned(),
            part: "seq",
        })?;
        Ok(Self::new(MonthStamp(month_stamp), seq))
    }

    /// Decode an optional token, treating a malformed one as absent.
    ///
    /// A broken cursor restarts the traversal at the newest event rather
    /// than failing the read.
    pub fn decode_lenient(token: Option<&str>) -> Option<Self> {
        let token = token.filter(|t| !t.is_empty())?;
        match Self::decode(token) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed cursor, restarting from newest");
                None
            }
        }
    }
}

impl core::fmt::Display for Cursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}_{}", self.month_stamp.into_inner(), self.seq)
    }
}

impl core::str::FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
