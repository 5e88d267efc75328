//! Pointer position sampling.

use std::process::Command;

use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::PointerSource;

/// Reads the pointer through `xdotool getmouselocation --shell`.
#[derive(Debug, Clone)]
pub struct XdotoolPointer {
    program: String,
}

impl Default for XdotoolPointer {
    fn default() -> Self {
        Self {
            program: "xdotool".to_string(),
        }
    }
}

impl XdotoolPointer {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PointerSource for XdotoolPointer {
    fn position(&self) -> ReelcapResult<(i32, i32)> {
        let output = Command::new(&self.program)
            .args(["getmouselocation", "--shell"])
            .output()
            .map_err(|e| {
                ReelcapError::platform(format!(
                    "Failed to execute {}. Install with: sudo apt install xdotool ({e})",
                    self.program
                ))
            })?;

        if !output.status.success() {
            return Err(ReelcapError::platform(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        parse_shell_location(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ReelcapError::platform("xdotool output did not contain X= and Y= lines")
        })
    }

    fn name(&self) -> &str {
        "xdotool"
    }
}

fn parse_shell_location(stdout: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;

    for line in stdout.lines() {
        if let Some(val) = line.strip_prefix("X=") {
            x = val.trim().parse::<i32>().ok();
        } else if let Some(val) = line.strip_prefix("Y=") {
            y = val.trim().parse::<i32>().ok();
        }
    }

    Some((x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shell_output() {
        let out = "X=1203\nY=88\nSCREEN=0\nWINDOW=6291462\n";
        assert_eq!(parse_shell_location(out), Some((1203, 88)));
    }

    #[test]
    fn incomplete_output_is_rejected() {
        assert_eq!(parse_shell_location("X=12\nSCREEN=0\n"), None);
        assert_eq!(parse_shell_location("X=abc\nY=4\n"), None);
    }

    #[test]
    fn missing_binary_is_an_error() {
        let pointer = XdotoolPointer::with_program("reelcap-no-such-xdotool");
        assert!(pointer.position().is_err());
    }
}
