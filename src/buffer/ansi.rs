//! ANSI escape sequence stripping

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Osc,
    OscEscape,
    Charset,
}

/// Streaming ANSI escape sequence stripper.
///
/// Keeps its parser state between calls, so a sequence split across two
/// reads is removed as a whole instead of leaking its tail into the output.
#[derive(Debug, Clone)]
pub struct AnsiStripper {
    state: State,
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiStripper {
    /// Create a stripper in the ground state
    pub fn new() -> Self {
        Self {
            state: State::Ground,
        }
    }

    /// Strip escape sequences from the next chunk of output
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(data.len());

        for &byte in data {
            self.state = match self.state {
                State::Ground => {
                    if byte == b'\x1b' {
                        State::Escape
                    } else {
                        result.push(byte);
                        State::Ground
                    }
                }
                State::Escape => match byte {
                    // CSI (Control Sequence Introducer)
                    b'[' => State::Csi,
                    // OSC (Operating System Command)
                    b']' => State::Osc,
                    // Character set selection (ESC ( X or ESC ) X)
                    b'(' | b')' => State::Charset,
                    // Other two-byte escapes
                    _ => State::Ground,
                },
                State::Csi => {
                    if (0x40..=0x7e).contains(&byte) {
                        State::Ground
                    } else {
                        State::Csi
                    }
                }
                // Terminated by BEL or ST (ESC \)
                State::Osc => match byte {
                    b'\x07' => State::Ground,
                    b'\x1b' => State::OscEscape,
                    _ => State::Osc,
                },
                State::OscEscape => {
                    if byte == b'\\' {
                        State::Ground
                    } else {
                        State::Osc
                    }
                }
                State::Charset => State::Ground,
            };
        }

        result
    }
}

/// Strip ANSI escape sequences from a complete byte slice
pub fn strip_ansi(data: &[u8]) -> Vec<u8> {
    AnsiStripper::new().strip(data)
}
