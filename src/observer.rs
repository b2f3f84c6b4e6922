use std::sync::mpsc::Sender;

use crate::{code_table::CodeTable, Error};

/// What a successful pipeline run produced.
///
/// A compression summary describes the payload by its code table and bit
/// length only; the packed bytes themselves went to the output sink and are
/// not repeated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Compressed {
        input_bytes: u64,
        table: CodeTable,
        payload_bits: usize,
        output_bytes: usize,
    },
    Decompressed {
        input_bytes: usize,
        output_bytes: usize,
    },
}

/// Callbacks a host receives while a pipeline runs.
///
/// Calls arrive on whatever thread runs the pipeline; getting them to a UI
/// thread is up to the host (see the `Sender<Event>` impl).
///
/// Within a run:
/// * intermediate status messages never contain "complete" or "Error"; the
///   final one contains exactly one of them.
/// * progress restarts at 0.0 with each stage and never decreases within it.
/// * `on_finish` fires exactly once, last.
pub trait Observer {
    fn on_status(&mut self, _message: &str) {}

    fn on_progress(&mut self, _fraction: f64) {}

    fn on_finish(&mut self, _outcome: Result<&Summary, &Error>) {}
}

/// Ignore everything.
impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_status(&mut self, message: &str) {
        (**self).on_status(message);
    }

    fn on_progress(&mut self, fraction: f64) {
        (**self).on_progress(fraction);
    }

    fn on_finish(&mut self, outcome: Result<&Summary, &Error>) {
        (**self).on_finish(outcome);
    }
}

/// An owned copy of one observer callback, so it can cross threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(String),
    Progress(f64),
    /// The error is flattened to its message.
    Finished(Result<Summary, String>),
}

impl Event {
    fn finished(outcome: Result<&Summary, &Error>) -> Self {
        Event::Finished(outcome.cloned().map_err(|e| e.to_string()))
    }
}

/// Forwards callbacks to the receiving end. If the receiver has hung up, the
/// events are dropped; the pipeline still runs to completion.
impl Observer for Sender<Event> {
    fn on_status(&mut self, message: &str) {
        let _ = self.send(Event::Status(message.to_owned()));
    }

    fn on_progress(&mut self, fraction: f64) {
        let _ = self.send(Event::Progress(fraction));
    }

    fn on_finish(&mut self, outcome: Result<&Summary, &Error>) {
        let _ = self.send(Event::finished(outcome));
    }
}

/// Records every callback, in order.
impl Observer for Vec<Event> {
    fn on_status(&mut self, message: &str) {
        self.push(Event::Status(message.to_owned()));
    }

    fn on_progress(&mut self, fraction: f64) {
        self.push(Event::Progress(fraction));
    }

    fn on_finish(&mut self, outcome: Result<&Summary, &Error>) {
        self.push(Event::finished(outcome));
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, thread};

    use super::*;

    #[test]
    fn events_cross_threads() {
        let (tx, rx) = mpsc::channel::<Event>();

        let worker = thread::spawn(move || {
            let mut observer = tx;
            observer.on_status("working");
            observer.on_progress(0.5);
            observer.on_finish(Err(&Error::Cancelled));
        });
        worker.join().unwrap();

        let events: Vec<Event> = rx.iter().collect();
        assert_eq!(
            events,
            [
                Event::Status("working".into()),
                Event::Progress(0.5),
                Event::Finished(Err("cancelled by host".into())),
            ]
        );
    }

    #[test]
    fn hung_up_receiver_is_ignored() {
        let (mut tx, rx) = mpsc::channel::<Event>();
        drop(rx);
        tx.on_status("nobody is listening");
    }

    #[test]
    fn forwards_through_mut_ref() {
        fn report(mut observer: impl Observer) {
            observer.on_progress(1.0);
        }

        let mut events = Vec::new();
        report(&mut events);
        assert_eq!(events, [Event::Progress(1.0)]);
    }
}
