use crossbeam_channel::Receiver;

/// Discrete command from the operator surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorEvent {
    /// Select the face under this frame pixel.
    Pick { x: i32, y: i32 },
    /// Drop the current selection.
    Reset,
    /// Stop the loop.
    Quit,
}

/// Source of operator events, sampled once per loop cycle.
pub trait OperatorInput: Send {
    /// Every event that arrived since the previous poll, oldest first.
    /// Must not block.
    fn poll(&mut self) -> Vec<OperatorEvent>;
}

/// Operator input fed through a channel, typically from a console thread.
///
/// A disconnected sender reads as a quit so the loop cannot outlive its
/// operator.
pub struct ChannelOperatorInput {
    receiver: Receiver<OperatorEvent>,
    disconnected: bool,
}

impl ChannelOperatorInput {
    pub fn new(receiver: Receiver<OperatorEvent>) -> Self {
        Self {
            receiver,
            disconnected: false,
        }
    }
}

impl OperatorInput for ChannelOperatorInput {
    fn poll(&mut self) -> Vec<OperatorEvent> {
        let mut events: Vec<OperatorEvent> = self.receiver.try_iter().collect();
        if !self.disconnected && events.is_empty() && self.receiver.is_empty() {
            if let Err(crossbeam_channel::TryRecvError::Disconnected) = self.receiver.try_recv() {
                log::info!("Operator console closed");
                self.disconnected = true;
                events.push(OperatorEvent::Quit);
            }
        }
        events
    }
}

/// Operator input that never produces events. Runs end on `max_frames`
/// or a capture error.
pub struct NoOperatorInput;

impl OperatorInput for NoOperatorInput {
    fn poll(&mut self) -> Vec<OperatorEvent> {
        Vec::new()
    }
}

/// Parses a console line: `pick X Y` (or `p X Y`), `reset` (`r`), `quit` (`q`).
pub fn parse_command(line: &str) -> Result<OperatorEvent, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err("empty command".to_string());
    };

    let event = match command.to_ascii_lowercase().as_str() {
        "pick" | "p" => {
            let mut coord = |axis: &str| -> Result<i32, String> {
                let word = words
                    .next()
                    .ok_or_else(|| format!("pick needs an {axis} coordinate"))?;
                word.parse::<i32>()
                    .map_err(|_| format!("invalid {axis} coordinate '{word}'"))
            };
            let x = coord("x")?;
            let y = coord("y")?;
            OperatorEvent::Pick { x, y }
        }
        "reset" | "r" => OperatorEvent::Reset,
        "quit" | "q" | "exit" => OperatorEvent::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };

    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument '{extra}'"));
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pick 10 20", OperatorEvent::Pick { x: 10, y: 20 })]
    #[case("  p 5   7 ", OperatorEvent::Pick { x: 5, y: 7 })]
    #[case("PICK -3 4", OperatorEvent::Pick { x: -3, y: 4 })]
    #[case("reset", OperatorEvent::Reset)]
    #[case("r", OperatorEvent::Reset)]
    #[case("quit", OperatorEvent::Quit)]
    #[case("q", OperatorEvent::Quit)]
    fn test_parse_command(#[case] line: &str, #[case] expected: OperatorEvent) {
        assert_eq!(parse_command(line).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("pick")]
    #[case("pick 10")]
    #[case("pick ten 20")]
    #[case("reset now")]
    #[case("jump")]
    fn test_parse_command_rejects(#[case] line: &str) {
        assert!(parse_command(line).is_err());
    }

    #[test]
    fn test_channel_poll_drains_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut input = ChannelOperatorInput::new(rx);

        tx.send(OperatorEvent::Pick { x: 1, y: 2 }).unwrap();
        tx.send(OperatorEvent::Reset).unwrap();

        assert_eq!(
            input.poll(),
            vec![OperatorEvent::Pick { x: 1, y: 2 }, OperatorEvent::Reset]
        );
        assert!(input.poll().is_empty());
    }

    #[test]
    fn test_reset_and_quit_in_same_cycle_are_both_delivered() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut input = ChannelOperatorInput::new(rx);

        tx.send(OperatorEvent::Reset).unwrap();
        tx.send(OperatorEvent::Quit).unwrap();

        assert_eq!(input.poll(), vec![OperatorEvent::Reset, OperatorEvent::Quit]);
    }

    #[test]
    fn test_disconnected_sender_quits_once() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut input = ChannelOperatorInput::new(rx);

        tx.send(OperatorEvent::Reset).unwrap();
        drop(tx);

        assert_eq!(input.poll(), vec![OperatorEvent::Reset]);
        assert_eq!(input.poll(), vec![OperatorEvent::Quit]);
        assert!(input.poll().is_empty());
    }

    #[test]
    fn test_no_operator_input_is_silent() {
        assert!(NoOperatorInput.poll().is_empty());
    }
}
