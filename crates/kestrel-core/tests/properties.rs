//! Property-based tests for kestrel-core buffers and the instance lifecycle.
//!
//! Buffers are checked against a `VecDeque` model under random reserve/commit
//! sequences; the lifecycle is checked against a transition table under random
//! operation sequences.

use std::collections::VecDeque;

use proptest::prelude::*;
use kestrel_core::{
    Buffer, BufferError, Capability, CapabilityDescriptor, CapabilityError, CapabilityId,
    CapabilityInstance, ConnectionId, Endpoint, EndpointLayout, InstanceId, InstanceState,
    ProcessIo, ProcessOutcome, SampleSize,
};

#[derive(Debug, Clone)]
enum BufOp {
    /// Reserve `n` for writing, commit `used` of it.
    Write { n: usize, used: usize, byte: u8 },
    /// Reserve `n` for reading, commit `used` of it.
    Read { n: usize, used: usize },
}

fn buf_op() -> impl Strategy<Value = BufOp> {
    prop_oneof![
        (0usize..40, 0usize..40, any::<u8>()).prop_map(|(n, used, byte)| BufOp::Write {
            n,
            used: used.min(n),
            byte
        }),
        (0usize..40, 0usize..40).prop_map(|(n, used)| BufOp::Read {
            n,
            used: used.min(n)
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Occupancy stays within bounds and contents match a FIFO model under
    /// any interleaving of partial writes and reads.
    #[test]
    fn buffer_matches_fifo_model(
        capacity in 1usize..48,
        ops in prop::collection::vec(buf_op(), 1..80),
    ) {
        let mut buf = Buffer::with_capacity(capacity);
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut counter = 0u8;

        for op in ops {
            match op {
                BufOp::Write { n, used, byte } => match buf.write_reserve(n) {
                    Ok(mut window) => {
                        prop_assert!(n <= capacity - model.len());
                        let data: Vec<u8> = (0..used).map(|i| byte.wrapping_add(i as u8).wrapping_add(counter)).collect();
                        window.copy_from_slice(0, &data);
                        window.commit(used).unwrap();
                        model.extend(&data);
                        counter = counter.wrapping_add(1);
                    }
                    Err(BufferError::InsufficientSpace { requested, available }) => {
                        prop_assert_eq!(requested, n);
                        prop_assert_eq!(available, capacity - model.len());
                        prop_assert!(n > available);
                    }
                    Err(e) => prop_assert!(false, "unexpected {e}"),
                },
                BufOp::Read { n, used } => match buf.read_reserve(n) {
                    Ok(mut window) => {
                        prop_assert!(n <= model.len());
                        let mut out = vec![0u8; used];
                        window.copy_to_slice(0, &mut out);
                        window.commit(used).unwrap();
                        let expected: Vec<u8> = model.drain(..used).collect();
                        prop_assert_eq!(out, expected);
                    }
                    Err(BufferError::InsufficientData { requested, available }) => {
                        prop_assert_eq!(requested, n);
                        prop_assert_eq!(available, model.len());
                    }
                    Err(e) => prop_assert!(false, "unexpected {e}"),
                },
            }
            prop_assert_eq!(buf.occupied(), model.len());
            prop_assert!(buf.occupied() <= buf.capacity());
            prop_assert_eq!(buf.space(), capacity - model.len());
            prop_assert!(!buf.is_write_open() && !buf.is_read_open());
        }
    }

    /// Writing then reading N bytes is byte-identical for every N up to
    /// capacity and every starting offset, including wrapped windows.
    #[test]
    fn round_trip_any_offset(
        capacity in 1usize..128,
        offset_seed in any::<usize>(),
        len_seed in any::<usize>(),
        seed in any::<u8>(),
    ) {
        let offset = offset_seed % capacity;
        let len = 1 + len_seed % capacity;
        let mut buf = Buffer::with_capacity(capacity);
        if offset > 0 {
            buf.write(&vec![0; offset]).unwrap();
            buf.discard(offset).unwrap();
        }

        let data: Vec<u8> = (0..len).map(|i| seed.wrapping_mul(31).wrapping_add(i as u8)).collect();
        let mut window = buf.write_reserve(len).unwrap();
        let (first, second) = window.as_mut_slices();
        prop_assert_eq!(first.len() + second.len(), len);
        prop_assert_eq!(first.len(), len.min(capacity - offset));
        window.copy_from_slice(0, &data);
        window.commit(len).unwrap();

        let mut out = vec![0u8; len];
        buf.read(&mut out).unwrap();
        prop_assert_eq!(out, data);
        prop_assert!(buf.is_empty());
    }
}

struct Nop;

impl Capability for Nop {
    fn process(&mut self, _io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        Ok(ProcessOutcome::idle())
    }
}

const NOP: CapabilityDescriptor = CapabilityDescriptor {
    id: CapabilityId(0x7F01),
    name: "nop",
    description: "",
    version: (1, 0),
    layout: EndpointLayout::fixed(1, 1),
    sample_size: SampleSize::Bits8,
    buffer_size_hint: 0,
    default_config: &[],
    create: |_| Ok(Box::new(Nop)),
};

#[derive(Debug, Clone, Copy)]
enum LifeOp {
    Bind(bool),
    Unbind(bool),
    Start,
    MarkRunning,
    Stop,
    Rearm,
}

fn life_op() -> impl Strategy<Value = LifeOp> {
    prop_oneof![
        any::<bool>().prop_map(LifeOp::Bind),
        any::<bool>().prop_map(LifeOp::Unbind),
        Just(LifeOp::Start),
        Just(LifeOp::MarkRunning),
        Just(LifeOp::Stop),
        Just(LifeOp::Rearm),
    ]
}

fn endpoint(input: bool) -> Endpoint {
    if input { Endpoint::Input(0) } else { Endpoint::Output(0) }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The instance follows the transition table exactly; every rejected
    /// operation reports the current state and leaves it unchanged.
    #[test]
    fn lifecycle_follows_transition_table(ops in prop::collection::vec(life_op(), 1..60)) {
        use InstanceState::{Connected, Created, Running, Started, Stopped};

        let mut inst = CapabilityInstance::create(InstanceId::from_raw(0), &NOP, &[]).unwrap();
        let mut state = Created;
        // [input bound, output bound]
        let mut bound = [false, false];
        let mut next_conn = 0u32;

        for op in ops {
            let before = inst.state();
            prop_assert_eq!(before, state);
            let bindable = matches!(state, Created | Connected | Stopped);

            let legal = match op {
                LifeOp::Bind(input) => {
                    let slot = usize::from(!input);
                    let ok = bindable && !bound[slot];
                    let result = inst.bind(endpoint(input), ConnectionId::from_raw(next_conn), SampleSize::Bits8);
                    next_conn += 1;
                    prop_assert_eq!(result.is_ok(), ok);
                    if ok {
                        bound[slot] = true;
                        if state == Created && bound == [true, true] {
                            state = Connected;
                        }
                    }
                    ok
                }
                LifeOp::Unbind(input) => {
                    let slot = usize::from(!input);
                    let result = inst.unbind(endpoint(input));
                    prop_assert_eq!(result.is_ok(), bindable);
                    if bindable {
                        prop_assert_eq!(result.unwrap().is_some(), bound[slot]);
                        bound[slot] = false;
                    }
                    bindable
                }
                LifeOp::Start => {
                    let ok = state == Connected && bound == [true, true];
                    prop_assert_eq!(inst.start().is_ok(), ok);
                    if ok { state = Started; }
                    ok
                }
                LifeOp::MarkRunning => {
                    let ok = state == Started;
                    prop_assert_eq!(inst.mark_running().is_ok(), ok);
                    if ok { state = Running; }
                    ok
                }
                LifeOp::Stop => {
                    let ok = matches!(state, Started | Running);
                    prop_assert_eq!(inst.stop().is_ok(), ok);
                    if ok { state = Stopped; }
                    ok
                }
                LifeOp::Rearm => {
                    let ok = state == Stopped && bound == [true, true];
                    prop_assert_eq!(inst.rearm().is_ok(), ok);
                    if ok { state = Connected; }
                    ok
                }
            };

            if !legal {
                prop_assert_eq!(inst.state(), before);
            }
            prop_assert_eq!(inst.state(), state);
            prop_assert_eq!(inst.bound_count(), bound.iter().filter(|b| **b).count());
        }
    }
}
