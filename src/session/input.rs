//! Operator input
//!
//! Line grammar, one command per line:
//!
//! | line        | event                               |
//! |-------------|-------------------------------------|
//! | `u`         | reprice up / tighten lock           |
//! | `d`         | reprice down / loosen lock          |
//! | `x`         | drop the lock, else cancel the order |
//! | `j <n>`     | skip `n` rows toward worse prices   |
//! | `k <n>`     | skip `n` rows toward better prices  |
//! | `l <n>`     | set lock depth                      |
//! | `p <price>` | enter a price                       |
//! | `h` / `hh`  | show history / refresh then show    |

use std::io::BufRead;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    RepriceUp,
    RepriceDown,
    CancelOrUnlock,
    /// Signed row offset; positive moves toward worse prices
    SetSkip(i64),
    SetLock(usize),
    EnterPrice(Decimal),
    ToggleHistory { refresh: bool },
}

impl FromStr for InputEvent {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let command = parts.next().ok_or_else(|| "empty line".to_string())?;
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments in {line:?}"));
        }

        let number = |arg: Option<&str>| -> Result<i64, String> {
            let raw = arg.ok_or_else(|| format!("`{command}` needs a number"))?;
            raw.parse::<i64>().map_err(|e| format!("bad number {raw:?}: {e}"))
        };
        let rows = |arg: Option<&str>| -> Result<i64, String> {
            let n = number(arg)?;
            n.checked_abs()
                .ok_or_else(|| format!("bad number {n}: row count out of range"))
        };

        match (command, arg) {
            ("u", None) => Ok(InputEvent::RepriceUp),
            ("d", None) => Ok(InputEvent::RepriceDown),
            ("x", None) => Ok(InputEvent::CancelOrUnlock),
            ("h", None) => Ok(InputEvent::ToggleHistory { refresh: false }),
            ("hh", None) => Ok(InputEvent::ToggleHistory { refresh: true }),
            ("j", _) => Ok(InputEvent::SetSkip(rows(arg)?)),
            ("k", _) => Ok(InputEvent::SetSkip(-rows(arg)?)),
            ("l", _) => {
                let depth = number(arg)?;
                usize::try_from(depth)
                    .map(InputEvent::SetLock)
                    .map_err(|_| format!("lock depth must be non-negative, got {depth}"))
            }
            ("p", Some(raw)) => Decimal::from_str(raw)
                .map(InputEvent::EnterPrice)
                .map_err(|e| format!("bad price {raw:?}: {e}")),
            ("p", None) => Err("`p` needs a price".to_string()),
            _ => Err(format!("unknown command {line:?}")),
        }
    }
}

/// Source of operator events polled once per cycle
#[allow(async_fn_in_trait)]
pub trait InputSource {
    /// At most one event, waiting no longer than `idle`
    async fn next_event(&mut self, idle: Duration) -> Option<InputEvent>;
}

/// Reads stdin lines on a dedicated thread
pub struct StdinInput {
    rx: mpsc::UnboundedReceiver<InputEvent>,
    closed: bool,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<InputEvent>() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("ignoring input: {}", e),
                }
            }
            debug!("stdin closed");
        });
        Self { rx, closed: false }
    }
}

impl InputSource for StdinInput {
    async fn next_event(&mut self, idle: Duration) -> Option<InputEvent> {
        if self.closed {
            tokio::time::sleep(idle).await;
            return None;
        }
        match tokio::time::timeout(idle, self.rx.recv()).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_commands() {
        assert_eq!("u".parse::<InputEvent>(), Ok(InputEvent::RepriceUp));
        assert_eq!(" d ".parse::<InputEvent>(), Ok(InputEvent::RepriceDown));
        assert_eq!("x".parse::<InputEvent>(), Ok(InputEvent::CancelOrUnlock));
        assert_eq!("j 3".parse::<InputEvent>(), Ok(InputEvent::SetSkip(3)));
        assert_eq!("k 2".parse::<InputEvent>(), Ok(InputEvent::SetSkip(-2)));
        assert_eq!("l 0".parse::<InputEvent>(), Ok(InputEvent::SetLock(0)));
        assert_eq!(
            "p 27100.5".parse::<InputEvent>(),
            Ok(InputEvent::EnterPrice(dec!(27100.5)))
        );
        assert_eq!(
            "hh".parse::<InputEvent>(),
            Ok(InputEvent::ToggleHistory { refresh: true })
        );
    }

    #[test]
    fn test_parse_rejections() {
        assert!("".parse::<InputEvent>().is_err());
        assert!("j".parse::<InputEvent>().is_err());
        assert!("l -1".parse::<InputEvent>().is_err());
        assert!("p abc".parse::<InputEvent>().is_err());
        assert!("u 1".parse::<InputEvent>().is_err());
        assert!("q".parse::<InputEvent>().is_err());
        assert!("k -9223372036854775808".parse::<InputEvent>().is_err());
        assert!("j -9223372036854775808".parse::<InputEvent>().is_err());
        assert!("j 9223372036854775808".parse::<InputEvent>().is_err());
        assert_eq!(
            "k -9223372036854775807".parse::<InputEvent>(),
            Ok(InputEvent::SetSkip(-i64::MAX))
        );
    }
}
