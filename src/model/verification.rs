/// Outcome of a signature check that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Rejected,
}

impl Verification {
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }

    /// 1 for verified, 0 for rejected
    pub fn code(self) -> i32 {
        match self {
            Verification::Verified => 1,
            Verification::Rejected => 0,
        }
    }
}

impl From<bool> for Verification {
    fn from(verified: bool) -> Self {
        if verified {
            Verification::Verified
        } else {
            Verification::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Verification::Verified.code(), 1);
        assert_eq!(Verification::Rejected.code(), 0);
        assert!(Verification::from(true).is_verified());
    }
}
