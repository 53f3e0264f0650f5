//! # Concurrency Tests using Loom
//!
//! This module uses loom to check the generation gate that guards the engine
//! task against a timeout racing a completion.

#[cfg(test)]
mod tests {
    use loom::sync::{Arc, Mutex};
    use loom::thread;
    use matrix_harness::core::execution::GenerationGate;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Message {
        Outcome(u64),
        TimedOut(u64),
    }

    fn generation(message: Message) -> u64 {
        match message {
            Message::Outcome(g) | Message::TimedOut(g) => g,
        }
    }

    /// Drains `count` messages from the inbox through the gate, returning the
    /// accepted ones.
    fn settle(inbox: &Mutex<VecDeque<Message>>, gate: &mut GenerationGate, count: usize) -> Vec<Message> {
        let mut accepted = Vec::new();
        let mut seen = 0;
        while seen < count {
            let next = inbox.lock().unwrap().pop_front();
            match next {
                Some(message) => {
                    if gate.claim(generation(message)) {
                        accepted.push(message);
                    }
                    seen += 1;
                }
                None => thread::yield_now(),
            }
        }
        accepted
    }

    /// A completion and a timer, both issued under generation 0, post to the
    /// inbox concurrently. Whatever the interleaving, exactly one decision is
    /// taken and the other message is discarded as stale.
    #[test]
    fn test_timeout_and_completion_race_has_one_winner() {
        const STACK_SIZE: usize = 8 * 1024 * 1024; // 8 MB

        let builder = std::thread::Builder::new()
            .name("loom-test-thread".into())
            .stack_size(STACK_SIZE);

        let handle = builder
            .spawn(|| {
                loom::model(|| {
                    let inbox = Arc::new(Mutex::new(VecDeque::new()));

                    let worker_inbox = inbox.clone();
                    let worker = thread::spawn(move || {
                        worker_inbox.lock().unwrap().push_back(Message::Outcome(0));
                    });
                    let timer_inbox = inbox.clone();
                    let timer = thread::spawn(move || {
                        timer_inbox.lock().unwrap().push_back(Message::TimedOut(0));
                    });

                    let mut gate = GenerationGate::default();
                    let accepted = settle(&inbox, &mut gate, 2);

                    worker.join().unwrap();
                    timer.join().unwrap();

                    assert_eq!(accepted.len(), 1);
                    assert_eq!(gate.stale(), 1);
                    assert_eq!(gate.current(), 1);
                });
            })
            .unwrap();

        handle.join().unwrap();
    }

    /// A late message from an older generation never displaces the decision
    /// taken for the current one.
    #[test]
    fn test_late_message_from_previous_generation_is_stale() {
        loom::model(|| {
            let inbox = Arc::new(Mutex::new(VecDeque::new()));
            let late_inbox = inbox.clone();
            let late = thread::spawn(move || {
                late_inbox.lock().unwrap().push_back(Message::Outcome(0));
            });
            inbox.lock().unwrap().push_back(Message::Outcome(1));

            let mut gate = GenerationGate::default();
            assert!(gate.claim(0));
            let accepted = settle(&inbox, &mut gate, 2);
            late.join().unwrap();

            assert_eq!(accepted, vec![Message::Outcome(1)]);
            assert_eq!(gate.stale(), 1);
        });
    }
}
