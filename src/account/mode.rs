//! Mode codec: fixed-width mode value <-> (call type, exec type, aux tag)

/// Width of an encoded mode value in bytes
pub const MODE_WIDTH: usize = 32;
/// Width of the auxiliary tag region (everything after the two type bytes)
pub const AUX_TAG_WIDTH: usize = MODE_WIDTH - 2;

/// Opaque fixed-width mode value as supplied by callers
pub type ModeCode = [u8; MODE_WIDTH];

/// Shape of the call the mode selects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallType {
    Single,
    Batch,
    Delegate,
    Static,
    /// Discriminant with no assigned shape. Preserved so the engine can
    /// report the offending byte instead of the codec guessing.
    Other(u8),
}

impl CallType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => CallType::Single,
            1 => CallType::Batch,
            2 => CallType::Delegate,
            3 => CallType::Static,
            other => CallType::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            CallType::Single => 0,
            CallType::Batch => 1,
            CallType::Delegate => 2,
            CallType::Static => 3,
            CallType::Other(byte) => byte,
        }
    }
}

/// Failure policy the mode selects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecType {
    /// Abort-all: any failure discards the whole batch
    Default,
    /// Continue-on-failure: per-item outbound failures are caught and reported
    Try,
    Other(u8),
}

impl ExecType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => ExecType::Default,
            1 => ExecType::Try,
            other => ExecType::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ExecType::Default => 0,
            ExecType::Try => 1,
            ExecType::Other(byte) => byte,
        }
    }
}

/// Decoded mode: call type in the first byte, exec type in the second,
/// remaining bytes reserved as an auxiliary tag.
///
/// Decoding is pure and total over 32-byte inputs; unsupported combinations
/// are the execution engine's problem, not the codec's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mode {
    pub call_type: CallType,
    pub exec_type: ExecType,
    pub aux_tag: [u8; AUX_TAG_WIDTH],
}

impl Mode {
    pub fn decode(code: &ModeCode) -> Self {
        let mut aux_tag = [0u8; AUX_TAG_WIDTH];
        aux_tag.copy_from_slice(&code[2..]);
        Mode {
            call_type: CallType::from_byte(code[0]),
            exec_type: ExecType::from_byte(code[1]),
            aux_tag,
        }
    }

    pub fn encode(&self) -> ModeCode {
        let mut code = [0u8; MODE_WIDTH];
        code[0] = self.call_type.to_byte();
        code[1] = self.exec_type.to_byte();
        code[2..].copy_from_slice(&self.aux_tag);
        code
    }

    /// Batch under the abort-all policy
    pub fn batch_default() -> Self {
        Mode {
            call_type: CallType::Batch,
            exec_type: ExecType::Default,
            aux_tag: [0u8; AUX_TAG_WIDTH],
        }
    }

    /// Batch under the continue-on-failure policy
    pub fn batch_try() -> Self {
        Mode {
            call_type: CallType::Batch,
            exec_type: ExecType::Try,
            aux_tag: [0u8; AUX_TAG_WIDTH],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_modes_roundtrip() {
        let code = Mode::batch_try().encode();
        let mode = Mode::decode(&code);
        assert_eq!(mode.call_type, CallType::Batch);
        assert_eq!(mode.exec_type, ExecType::Try);
        assert_eq!(mode.aux_tag, [0u8; AUX_TAG_WIDTH]);
    }

    #[test]
    fn test_unknown_discriminants_survive_decoding() {
        let mut code = [0u8; MODE_WIDTH];
        code[0] = 0x7F;
        code[1] = 0x42;
        code[5] = 0x99;

        let mode = Mode::decode(&code);
        assert_eq!(mode.call_type, CallType::Other(0x7F));
        assert_eq!(mode.exec_type, ExecType::Other(0x42));
        // The tag region is carried through untouched
        assert_eq!(mode.encode(), code);
    }
}
