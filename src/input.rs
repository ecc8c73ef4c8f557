use crate::log_debug;
use crate::session::InputEvent;
use crossbeam_channel::Sender;
use std::io::{self, BufRead};
use std::thread;

/// Read stdin line by line on a background thread so the controller can wait
/// on input and on the capture worker at the same time.
pub fn spawn_input_thread(tx: Sender<InputEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || read_lines(io::stdin().lock(), &tx))
}

fn read_lines<R: BufRead>(mut reader: R, tx: &Sender<InputEvent>) {
    let mut line = String::new();
    loop {
        line.clear();
        let event = match reader.read_line(&mut line) {
            Ok(0) => InputEvent::Closed,
            Ok(_) => InputEvent::Line,
            Err(err) => {
                log_debug(&format!("stdin read error: {err}"));
                InputEvent::Closed
            }
        };
        if tx.send(event).is_err() || event == InputEvent::Closed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    #[test]
    fn emits_one_event_per_line_then_closed() {
        let (tx, rx) = unbounded();
        read_lines(Cursor::new("\nanything\n"), &tx);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![InputEvent::Line, InputEvent::Line, InputEvent::Closed]
        );
    }

    #[test]
    fn stops_when_receiver_is_gone() {
        let (tx, rx) = unbounded();
        drop(rx);
        read_lines(Cursor::new("\n\n\n"), &tx);
    }
}
