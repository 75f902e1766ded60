use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::Barrier;
use std::thread::scope;

use lockfree_stack::{Stack, TreiberStack, VersionedStack};
use rand::{thread_rng, Rng};

mod properties {
    use super::*;

    pub fn empty_on_init<S: Stack<usize>>() {
        let stack = S::default();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.peek(), None);
        assert_eq!(stack.size(), 0);
        assert!(stack.is_empty());
    }

    pub fn lifo<S: Stack<&'static str>>() {
        let stack = S::default();
        assert!(stack.push("v1"));
        assert!(stack.push("v2"));
        assert!(stack.push("v3"));
        assert_eq!(stack.size(), 3);

        assert_eq!(stack.pop(), Some("v3"));
        assert_eq!(stack.pop(), Some("v2"));
        assert_eq!(stack.pop(), Some("v1"));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    pub fn push_pop_inverse<S: Stack<u64>>() {
        const LENGTH: usize = 1024;

        let mut rng = thread_rng();
        let pushed = (0..LENGTH).map(|_| rng.gen::<u64>()).collect::<Vec<_>>();

        let stack = S::default();
        for v in &pushed {
            let _ = stack.push(*v);
        }
        assert_eq!(stack.size(), LENGTH);

        let mut popped = Vec::with_capacity(LENGTH);
        while let Some(v) = stack.pop() {
            popped.push(v);
        }
        popped.reverse();
        assert_eq!(popped, pushed);
    }

    pub fn peek_is_non_mutating<S: Stack<String>>() {
        let stack = S::default();
        let _ = stack.push("bottom".to_string());
        let _ = stack.push("top".to_string());

        for _ in 0..10 {
            assert_eq!(stack.peek().as_deref(), Some("top"));
        }
        assert_eq!(stack.size(), 2);

        let _ = stack.push("newer".to_string());
        assert_eq!(stack.peek().as_deref(), Some("newer"));
        assert_eq!(stack.pop().as_deref(), Some("newer"));
        assert_eq!(stack.pop().as_deref(), Some("top"));
        assert_eq!(stack.pop().as_deref(), Some("bottom"));
        assert_eq!(stack.peek(), None);
    }

    pub fn try_push<S: Stack<Vec<u8>>>() {
        let stack = S::default();
        stack.try_push(vec![1, 2, 3]).unwrap();
        stack.try_push(vec![4]).unwrap();

        assert_eq!(stack.size(), 2);
        assert_eq!(stack.pop(), Some(vec![4]));
        assert_eq!(stack.pop(), Some(vec![1, 2, 3]));
    }

    /// N threads push M distinct values each; a sequential drain finds each exactly once.
    pub fn concurrent_pushes<S: Stack<usize> + Sync>() {
        const THREADS: usize = 8;
        const ITER: usize = 1024 * 4;

        let stack = S::default();
        scope(|s| {
            for t in 0..THREADS {
                let stack = &stack;
                let _unused = s.spawn(move || {
                    for i in 0..ITER {
                        assert!(stack.push(t * ITER + i));
                    }
                });
            }
        });
        assert_eq!(stack.size(), THREADS * ITER);

        let mut seen = HashSet::with_capacity(THREADS * ITER);
        let mut last = vec![usize::MAX; THREADS];
        while let Some(v) = stack.pop() {
            assert!(seen.insert(v), "{} popped twice", v);

            // Values of one thread come out in reverse push order.
            let (t, i) = (v / ITER, v % ITER);
            assert!(i < last[t]);
            last[t] = i;
        }
        assert_eq!(seen.len(), THREADS * ITER);
        assert_eq!(stack.size(), 0);
    }

    /// T threads push once and T threads pop once, all released together.
    pub fn no_lost_updates<S: Stack<usize> + Sync>() {
        const THREADS: usize = 16;
        const PREFILL: usize = 4;

        let stack = S::default();
        for i in 0..PREFILL {
            let _ = stack.push(usize::MAX - i);
        }

        let barrier = Barrier::new(2 * THREADS);
        let popped = AtomicUsize::new(0);
        scope(|s| {
            for t in 0..THREADS {
                let (stack, barrier) = (&stack, &barrier);
                let _unused = s.spawn(move || {
                    let _ = barrier.wait();
                    assert!(stack.push(t));
                });
            }
            for _ in 0..THREADS {
                let (stack, barrier, popped) = (&stack, &barrier, &popped);
                let _unused = s.spawn(move || {
                    let _ = barrier.wait();
                    if stack.pop().is_some() {
                        let _ = popped.fetch_add(1, Relaxed);
                    }
                });
            }
        });

        let expected = PREFILL + THREADS - popped.load(Relaxed);
        assert_eq!(stack.size(), expected);

        let mut remaining = 0;
        while stack.pop().is_some() {
            remaining += 1;
        }
        assert_eq!(remaining, expected);
        assert_eq!(stack.size(), 0);
    }

    /// Random push/pop mix; the final chain length matches the committed operations.
    pub fn random_mix<S: Stack<u32> + Sync>() {
        const THREADS: usize = 8;
        const ITER: usize = 1024 * 8;

        let stack = S::default();
        let pushes = AtomicUsize::new(0);
        let pops = AtomicUsize::new(0);
        scope(|s| {
            for _ in 0..THREADS {
                let (stack, pushes, pops) = (&stack, &pushes, &pops);
                let _unused = s.spawn(move || {
                    let mut rng = thread_rng();
                    for _ in 0..ITER {
                        if rng.gen_bool(0.7) {
                            let _ = stack.push(rng.gen());
                            let _ = pushes.fetch_add(1, Relaxed);
                        } else if stack.pop().is_some() {
                            let _ = pops.fetch_add(1, Relaxed);
                        }
                        let _ = stack.peek();
                    }
                });
            }
        });

        let expected = pushes.load(Relaxed) - pops.load(Relaxed);
        assert_eq!(stack.size(), expected);

        let mut drained = 0;
        while stack.pop().is_some() {
            drained += 1;
        }
        assert_eq!(drained, expected);
    }

    /// Readers peek while writers churn the head; every peeked value was pushed.
    pub fn peek_under_contention<S: Stack<String> + Sync>() {
        const WRITERS: usize = 4;
        const READERS: usize = 4;
        const ITER: usize = 1024 * 4;

        let stack = S::default();
        let _ = stack.push("seed".to_string());
        scope(|s| {
            for w in 0..WRITERS {
                let stack = &stack;
                let _unused = s.spawn(move || {
                    for i in 0..ITER {
                        let _ = stack.push(format!("{}-{}", w, i));
                        assert!(stack.pop().is_some());
                    }
                });
            }
            for _ in 0..READERS {
                let stack = &stack;
                let _unused = s.spawn(move || {
                    for _ in 0..ITER {
                        let v = stack.peek().unwrap();
                        assert!(v == "seed" || v.contains('-'), "unexpected {:?}", v);
                    }
                });
            }
        });

        assert_eq!(stack.pop().as_deref(), Some("seed"));
        assert!(stack.is_empty());
    }
}

macro_rules! stack_tests {
    ($name:ident, $stack:ident) => {
        mod $name {
            use super::properties;
            use lockfree_stack::$stack;

            #[test]
            fn empty_on_init() {
                properties::empty_on_init::<$stack<usize>>();
            }

            #[test]
            fn lifo() {
                properties::lifo::<$stack<&'static str>>();
            }

            #[test]
            fn push_pop_inverse() {
                properties::push_pop_inverse::<$stack<u64>>();
            }

            #[test]
            fn peek_is_non_mutating() {
                properties::peek_is_non_mutating::<$stack<String>>();
            }

            #[test]
            fn try_push() {
                properties::try_push::<$stack<Vec<u8>>>();
            }

            #[test]
            fn concurrent_pushes() {
                properties::concurrent_pushes::<$stack<usize>>();
            }

            #[test]
            fn no_lost_updates() {
                properties::no_lost_updates::<$stack<usize>>();
            }

            #[test]
            fn random_mix() {
                properties::random_mix::<$stack<u32>>();
            }

            #[test]
            fn peek_under_contention() {
                properties::peek_under_contention::<$stack<String>>();
            }
        }
    };
}

stack_tests!(treiber, TreiberStack);
stack_tests!(versioned, VersionedStack);

#[test]
fn send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<TreiberStack<String>>();
    assert_send_sync::<VersionedStack<String>>();
}
