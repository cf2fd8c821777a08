//! VM execution tests.
//!
//! Programs are assembled with `ImageBuilder` and run end to end through
//! the public `Vm` API.

use qvm_bytecode::{ByteOrder, ErrorKind, ImageBuilder, Instruction, Opcode, SymbolTable};

use super::{
    Error, FuelLimits, RuntimeError, StackFault, SyscallContext, SyscallError, SystemCalls,
    Tracer, Vm, VmState,
};

/// Host for programs that make no syscalls.
struct NoSyscalls;

impl SystemCalls for NoSyscalls {
    fn syscall(
        &mut self,
        _ctx: &mut SyscallContext<'_>,
        _id: u32,
        _args: &[i32],
    ) -> Result<i32, SyscallError> {
        Err(SyscallError::Unknown)
    }
}

fn op(opcode: Opcode, operand: i32) -> Instruction {
    Instruction::new(opcode, operand)
}

fn bare(opcode: Opcode) -> Instruction {
    Instruction::bare(opcode)
}

fn load(code: Vec<Instruction>) -> Vm<NoSyscalls> {
    let image = ImageBuilder::new(code).build().unwrap();
    Vm::create(&image, "test", NoSyscalls).unwrap()
}

fn runtime_error(err: Error) -> RuntimeError {
    err.as_runtime().cloned().expect("runtime error")
}

/// `f(a, b) = a + b`.
fn add_program() -> Vec<Instruction> {
    vec![
        op(Opcode::Enter, 8),
        op(Opcode::Local, 16),
        bare(Opcode::Load4),
        op(Opcode::Local, 20),
        bare(Opcode::Load4),
        bare(Opcode::Add),
        op(Opcode::Leave, 8),
    ]
}

#[test]
fn add_two_arguments() {
    let mut vm = load(add_program());

    assert_eq!(vm.call(0, &[2, 3]).unwrap(), 5);
    assert_eq!(vm.call(0, &[-10, 3]).unwrap(), -7);
    assert_eq!(vm.state(), VmState::Idle);
}

#[test]
fn bytecode_calls_return_through_saved_pc() {
    let mut vm = load(vec![
        op(Opcode::Enter, 8),
        op(Opcode::Const, 7),
        bare(Opcode::Call),
        op(Opcode::Const, 7),
        bare(Opcode::Call),
        bare(Opcode::Add),
        op(Opcode::Leave, 8),
        // helper
        op(Opcode::Enter, 0),
        op(Opcode::Const, 3),
        op(Opcode::Leave, 0),
    ]);

    assert_eq!(vm.call(0, &[]).unwrap(), 6);
}

#[test]
fn branches_compare_second_against_top() {
    // max(a, b)
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Local, 8),
        bare(Opcode::Load4),
        op(Opcode::Local, 12),
        bare(Opcode::Load4),
        op(Opcode::Gti, 9),
        op(Opcode::Local, 12),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
        op(Opcode::Local, 8),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
    ]);

    assert_eq!(vm.call(0, &[4, 9]).unwrap(), 9);
    assert_eq!(vm.call(0, &[9, 4]).unwrap(), 9);
    assert_eq!(vm.call(0, &[-1, 1]).unwrap(), 1);
}

#[test]
fn unsigned_and_float_branches() {
    let program = |branch: Opcode| {
        vec![
            op(Opcode::Enter, 0),
            op(Opcode::Local, 8),
            bare(Opcode::Load4),
            op(Opcode::Local, 12),
            bare(Opcode::Load4),
            op(branch, 8),
            op(Opcode::Const, 0),
            op(Opcode::Leave, 0),
            op(Opcode::Const, 1),
            op(Opcode::Leave, 0),
        ]
    };

    let mut ltu = load(program(Opcode::Ltu));
    assert_eq!(ltu.call(0, &[1, -1]).unwrap(), 1);
    assert_eq!(ltu.call(0, &[-1, 1]).unwrap(), 0);

    let mut ltf = load(program(Opcode::Ltf));
    let f = |v: f32| v.to_bits() as i32;
    assert_eq!(ltf.call(0, &[f(-2.5), f(1.0)]).unwrap(), 1);
    assert_eq!(ltf.call(0, &[f(2.5), f(1.0)]).unwrap(), 0);
}

#[test]
fn integer_arithmetic_wraps() {
    let binary = |opcode: Opcode, a: i32, b: i32| {
        let mut vm = load(vec![
            op(Opcode::Enter, 0),
            op(Opcode::Const, a),
            op(Opcode::Const, b),
            bare(opcode),
            op(Opcode::Leave, 0),
        ]);
        vm.call(0, &[]).unwrap()
    };

    assert_eq!(binary(Opcode::Add, i32::MAX, 1), i32::MIN);
    assert_eq!(binary(Opcode::Sub, 3, 5), -2);
    assert_eq!(binary(Opcode::Muli, -4, 6), -24);
    assert_eq!(binary(Opcode::Divi, -7, 2), -3);
    assert_eq!(binary(Opcode::Divi, i32::MIN, -1), i32::MIN);
    assert_eq!(binary(Opcode::Divu, -2, 2), i32::MAX);
    assert_eq!(binary(Opcode::Modi, -7, 2), -1);
    assert_eq!(binary(Opcode::Modu, -1, 10), 5);
    assert_eq!(binary(Opcode::Lsh, 1, 33), 2);
    assert_eq!(binary(Opcode::Rshi, -16, 2), -4);
    assert_eq!(binary(Opcode::Rshu, -16, 28), 15);
    assert_eq!(binary(Opcode::Band, 0b1100, 0b1010), 0b1000);
    assert_eq!(binary(Opcode::Bor, 0b1100, 0b1010), 0b1110);
    assert_eq!(binary(Opcode::Bxor, 0b1100, 0b1010), 0b0110);
}

#[test]
fn unary_and_conversions() {
    let unary = |opcode: Opcode, a: i32| {
        let mut vm = load(vec![
            op(Opcode::Enter, 0),
            op(Opcode::Const, a),
            bare(opcode),
            op(Opcode::Leave, 0),
        ]);
        vm.call(0, &[]).unwrap()
    };
    let f = |v: f32| v.to_bits() as i32;

    assert_eq!(unary(Opcode::Sex8, 0xFF), -1);
    assert_eq!(unary(Opcode::Sex8, 0x17F), 0x7F);
    assert_eq!(unary(Opcode::Sex16, 0x8000), -32768);
    assert_eq!(unary(Opcode::Negi, i32::MIN), i32::MIN);
    assert_eq!(unary(Opcode::Bcom, 0), -1);
    assert_eq!(unary(Opcode::Cvif, -3), f(-3.0));
    assert_eq!(unary(Opcode::Cvfi, f(3.75)), 3);
    assert_eq!(unary(Opcode::Cvfi, f(-3.75)), -3);
    assert_eq!(unary(Opcode::Negf, f(1.5)), f(-1.5));
}

#[test]
fn float_arithmetic() {
    let f = |v: f32| v.to_bits() as i32;
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, f(1.5)),
        op(Opcode::Const, f(2.25)),
        bare(Opcode::Addf),
        op(Opcode::Const, f(2.0)),
        bare(Opcode::Mulf),
        op(Opcode::Const, f(0.5)),
        bare(Opcode::Subf),
        op(Opcode::Const, f(4.0)),
        bare(Opcode::Divf),
        bare(Opcode::Cvfi),
        op(Opcode::Leave, 0),
    ]);

    // ((1.5 + 2.25) * 2 - 0.5) / 4 = 1.75
    assert_eq!(vm.call(0, &[]).unwrap(), 1);
}

#[test]
fn divide_by_zero_faults() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 1),
        op(Opcode::Const, 0),
        bare(Opcode::Modu),
        op(Opcode::Leave, 0),
    ]);

    let err = vm.call(0, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalOperation);
    insta::assert_snapshot!(err, @"integer division by zero");
    assert_eq!(vm.fault_pc(), Some(3));
}

#[test]
fn store_and_load_widths() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 64),
        op(Opcode::Const, 0x1234_5678),
        bare(Opcode::Store4),
        op(Opcode::Const, 64),
        op(Opcode::Const, 0xAB),
        bare(Opcode::Store1),
        op(Opcode::Const, 66),
        op(Opcode::Const, 0x1_CDEF),
        bare(Opcode::Store2),
        op(Opcode::Const, 64),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
    ]);

    assert_eq!(vm.call(0, &[]).unwrap(), 0xCDEF_56ABu32 as i32);
    assert_eq!(vm.memory().slice(64, 4).unwrap(), &[0xAB, 0x56, 0xEF, 0xCD]);
}

#[test]
fn block_copy_moves_literals() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 100),
        op(Opcode::Const, 0),
        op(Opcode::BlockCopy, 4),
        op(Opcode::Const, 100),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
    ])
    .literals(b"abcd")
    .build()
    .unwrap();
    let mut vm = Vm::create(&image, "copy", NoSyscalls).unwrap();

    assert_eq!(vm.call(0, &[]).unwrap(), i32::from_le_bytes(*b"abcd"));
    assert_eq!(vm.memory().slice(100, 4).unwrap(), b"abcd");
}

#[test]
fn loads_are_masked_into_the_segment() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 8),
        op(Opcode::Const, 77),
        bare(Opcode::Store4),
        op(Opcode::Local, 8),
        bare(Opcode::Load4),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
    ]);
    let size = vm.memory().len() as i32;

    // An address one segment-size above 8 aliases 8.
    assert_eq!(vm.call(0, &[size + 8]).unwrap(), 77);
}

#[test]
fn unaligned_access_at_segment_end_faults() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Local, 8),
        bare(Opcode::Load4),
        bare(Opcode::Load4),
        op(Opcode::Leave, 0),
    ]);
    let size = vm.memory().len() as i32;

    let err = vm.call(0, &[size - 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MemoryFault);
    assert_eq!(vm.state(), VmState::Faulted);
}

#[test]
fn layout_and_data_initialization() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0)])
        .literals(b"A\0")
        .words(&[1000, -1])
        .bss(64)
        .build()
        .unwrap();
    let vm = Vm::create(&image, "layout", NoSyscalls).unwrap();

    // 4 + 8 data, 64 bss and a 64 KiB stack round up to 128 KiB.
    assert_eq!(vm.memory().len(), 0x20000);
    assert_eq!(vm.memory().mask(), 0x1FFFF);
    assert_eq!(vm.stack_range(), 0x10000..0x20000);
    assert_eq!(vm.memory().slice(0, 2).unwrap(), b"A\0");
    assert_eq!(vm.memory().read_i32(4).unwrap(), 1000);
    assert_eq!(vm.memory().read_i32(8).unwrap(), -1);
    assert!(vm.memory().slice(12, 64).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn minimum_data_size_respected() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0)]).build().unwrap();
    let vm = Vm::builder("small", NoSyscalls)
        .stack_size(0x100)
        .min_data_size(0x1000)
        .build(&image)
        .unwrap();

    assert_eq!(vm.memory().len(), 0x1000);
    assert_eq!(vm.stack_range(), 0xF00..0x1000);
}

#[test]
fn oversized_stack_is_a_load_error() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0)]).build().unwrap();

    let err = Vm::builder("huge", NoSyscalls)
        .stack_size(usize::MAX)
        .build(&image)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    insta::assert_snapshot!(err, @"invalid header: segments need 18446744073709551615 bytes, more than the address space");

    let err = Vm::builder("huge", NoSyscalls)
        .stack_size(0x8000_0001)
        .build(&image)
        .err()
        .unwrap();
    insta::assert_snapshot!(err, @"invalid header: segments need 2147483649 bytes, more than the address space");
}

#[test]
fn oversized_minimum_data_size_is_a_load_error() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0)]).build().unwrap();

    let err = Vm::builder("huge", NoSyscalls)
        .min_data_size(usize::MAX)
        .build(&image)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
}

#[test]
fn huge_instruction_count_over_empty_code() {
    let image = ImageBuilder::from_code_bytes(Vec::new(), i32::MAX as usize)
        .build()
        .unwrap();

    let err = Vm::create(&image, "empty", NoSyscalls).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MalformedBytecode);
    insta::assert_snapshot!(err, @"malformed bytecode: code segment ends after 0 of 2147483647 instructions");
}

#[test]
fn same_program_in_both_byte_orders() {
    let code = vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 4),
        bare(Opcode::Load4),
        op(Opcode::Const, 0),
        bare(Opcode::Load1),
        bare(Opcode::Add),
        op(Opcode::Const, 0x0102_0304),
        bare(Opcode::Bxor),
        op(Opcode::Leave, 0),
    ];

    let results: Vec<i32> = [ByteOrder::Little, ByteOrder::Big]
        .into_iter()
        .map(|order| {
            let image = ImageBuilder::new(code.clone())
                .byte_order(order)
                .literals(b"A")
                .words(&[1000])
                .build()
                .unwrap();
            let mut vm = Vm::builder("endian", NoSyscalls)
                .byte_order(order)
                .build(&image)
                .unwrap();
            vm.call(0, &[]).unwrap()
        })
        .collect();

    assert_eq!(results, [1065 ^ 0x0102_0304, 1065 ^ 0x0102_0304]);
}

#[test]
fn wrong_byte_order_is_rejected() {
    let image = ImageBuilder::new(add_program())
        .byte_order(ByteOrder::Big)
        .build()
        .unwrap();

    let err = Vm::create(&image, "bad", NoSyscalls).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
}

#[test]
fn malformed_code_aborts_create() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0), op(Opcode::Ne, 40)])
        .build()
        .unwrap();

    let err = Vm::create(&image, "bad", NoSyscalls).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MalformedBytecode);
    insta::assert_snapshot!(err, @"malformed bytecode: instruction 1 branches to 40, outside 0..2");
}

#[test]
fn unbounded_recursion_hits_limit() {
    let mut vm = load(vec![
        op(Opcode::Enter, 8),
        op(Opcode::Const, 0),
        bare(Opcode::Call),
        op(Opcode::Leave, 8),
    ]);

    let err = vm.call(0, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecursionLimitExceeded);
    insta::assert_snapshot!(err, @"recursion limit exceeded (1024 frames)");
}

#[test]
fn deep_frames_exhaust_program_stack() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0x400),
        op(Opcode::Const, 0),
        bare(Opcode::Call),
        op(Opcode::Leave, 0x400),
    ])
    .build()
    .unwrap();
    let mut vm = Vm::builder("deep", NoSyscalls)
        .stack_size(0x1000)
        .build(&image)
        .unwrap();

    let err = runtime_error(vm.call(0, &[]).unwrap_err());
    assert!(matches!(
        err,
        RuntimeError::Stack(StackFault::ProgramOverflow { requested: 0x400, .. })
    ));
}

#[test]
fn frame_larger_than_remaining_stack_faults() {
    let image = ImageBuilder::new(vec![op(Opcode::Enter, 0x1000), op(Opcode::Leave, 0x1000)])
        .build()
        .unwrap();
    let mut vm = Vm::builder("floor", NoSyscalls)
        .stack_size(0x1000)
        .build(&image)
        .unwrap();

    let err = vm.call(0, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StackFault);
    insta::assert_snapshot!(err, @"stack fault: program stack overflow: 4096 bytes below 0xffc4, floor 0xf000");
}

#[test]
fn leave_past_stack_top_faults() {
    let mut vm = load(vec![op(Opcode::Enter, 0), op(Opcode::Leave, 0x100)]);

    let err = runtime_error(vm.call(0, &[]).unwrap_err());
    assert!(matches!(
        err,
        RuntimeError::Stack(StackFault::ProgramUnderflow { released: 0x100, .. })
    ));
}

#[test]
fn invocation_must_return_one_value() {
    let mut vm = load(vec![op(Opcode::Enter, 0), op(Opcode::Leave, 0)]);

    let err = vm.call(0, &[]).unwrap_err();
    insta::assert_snapshot!(err, @"stack fault: invocation returned with 0 operand stack values, expected 1");
}

#[test]
fn operand_stack_overflow() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0),
        bare(Opcode::Push),
        op(Opcode::Const, 1),
        bare(Opcode::Jump),
    ])
    .build()
    .unwrap();
    let mut vm = Vm::builder("push", NoSyscalls)
        .op_stack_size(16)
        .build(&image)
        .unwrap();

    let err = runtime_error(vm.call(0, &[]).unwrap_err());
    assert_eq!(
        err,
        RuntimeError::Stack(StackFault::OperandOverflow { capacity: 16 })
    );
}

#[test]
fn runtime_jump_target_checked() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 5),
        op(Opcode::Const, 1),
        bare(Opcode::Add),
        bare(Opcode::Jump),
    ]);

    let err = runtime_error(vm.call(0, &[]).unwrap_err());
    assert_eq!(err, RuntimeError::BadJumpTarget { target: 6 });
}

#[test]
fn host_entry_checks() {
    let mut vm = load(add_program());
    let err = runtime_error(vm.call(7, &[]).unwrap_err());
    assert_eq!(err, RuntimeError::BadCallTarget { target: 7 });

    let mut vm = load(add_program());
    let err = vm.call(0, &[0; 14]).unwrap_err();
    insta::assert_snapshot!(err, @"too many arguments: 14 (maximum 13)");
}

#[test]
fn fuel_exhaustion_faults_and_vm_stays_faulted() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 1),
        bare(Opcode::Jump),
    ])
    .build()
    .unwrap();
    let mut vm = Vm::builder("spin", NoSyscalls)
        .limits(FuelLimits::new().exec_fuel(1_000))
        .build(&image)
        .unwrap();

    let err = vm.call(0, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecFuelExhausted);
    assert_eq!(vm.state(), VmState::Faulted);

    let err = vm.call(0, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Faulted);
    insta::assert_snapshot!(err, @"vm is faulted");
}

#[test]
fn fuel_resets_per_outermost_call() {
    let mut vm = Vm::builder("fuel", NoSyscalls)
        .exec_fuel(add_program().len() as u64)
        .build(&ImageBuilder::new(add_program()).build().unwrap())
        .unwrap();

    for _ in 0..3 {
        assert_eq!(vm.call(0, &[1, 1]).unwrap(), 2);
    }
}

#[test]
fn undef_and_ignore_are_no_ops() {
    let mut vm = load(vec![
        op(Opcode::Enter, 0),
        bare(Opcode::Undef),
        bare(Opcode::Ignore),
        op(Opcode::Const, 9),
        op(Opcode::Leave, 0),
    ]);

    assert_eq!(vm.call(0, &[]).unwrap(), 9);
}

#[test]
fn break_count_and_break_function() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0),
        bare(Opcode::Break),
        bare(Opcode::Break),
        op(Opcode::Const, 0),
        op(Opcode::Leave, 0),
    ])
    .build()
    .unwrap();

    let mut plain = Vm::create(&image, "plain", NoSyscalls).unwrap();
    plain.call(0, &[]).unwrap();
    assert_eq!(plain.break_count(), 2);

    let mut hooked = Vm::builder("hooked", NoSyscalls)
        .break_function(0)
        .build(&image)
        .unwrap();
    hooked.call(0, &[]).unwrap();
    hooked.call(0, &[]).unwrap();
    assert_eq!(hooked.break_count(), 6);
}

#[test]
fn profile_counts_calls_per_symbol() {
    let code = vec![
        op(Opcode::Enter, 8),
        op(Opcode::Const, 7),
        bare(Opcode::Call),
        op(Opcode::Const, 7),
        bare(Opcode::Call),
        bare(Opcode::Add),
        op(Opcode::Leave, 8),
        op(Opcode::Enter, 0),
        op(Opcode::Const, 3),
        op(Opcode::Leave, 0),
    ];
    let image = ImageBuilder::new(code).build().unwrap();
    let mut vm = Vm::builder("profiled", NoSyscalls)
        .symbols(SymbolTable::from_pairs([(0, "main"), (7, "three")]))
        .profile(true)
        .build(&image)
        .unwrap();

    assert_eq!(vm.call_symbol("main", &[]).unwrap(), 6);
    assert_eq!(vm.symbols().find("main").unwrap().call_count, 1);
    assert_eq!(vm.symbols().find("three").unwrap().call_count, 2);
    assert_eq!(vm.call_symbol("three", &[]).unwrap(), 3);

    let err = vm.call_symbol("missing", &[]).unwrap_err();
    insta::assert_snapshot!(err, @r#"no function named "missing""#);
    assert_eq!(vm.state(), VmState::Idle);
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Tracer for Recorder {
    fn trace_instruction(&mut self, _pc: usize, _instr: Instruction, _program_stack: u32) {}

    fn trace_call(&mut self, pc: usize, target: usize) {
        self.events.push(format!("call {pc} -> {target}"));
    }

    fn trace_return(&mut self, pc: usize, to: Option<usize>) {
        self.events.push(format!("return {pc} -> {to:?}"));
    }

    fn trace_syscall(&mut self, pc: usize, id: u32, _args: &[i32]) {
        self.events.push(format!("syscall {pc} #{id}"));
    }

    fn trace_syscall_return(&mut self, id: u32, value: i32) {
        self.events.push(format!("syscall #{id} = {value}"));
    }

    fn trace_break(&mut self, pc: usize, count: u64) {
        self.events.push(format!("break {pc} ({count})"));
    }
}

#[test]
fn tracer_sees_control_flow() {
    let mut vm = load(vec![
        op(Opcode::Enter, 8),
        op(Opcode::Const, 4),
        bare(Opcode::Call),
        op(Opcode::Leave, 8),
        op(Opcode::Enter, 0),
        bare(Opcode::Break),
        op(Opcode::Const, 1),
        op(Opcode::Leave, 0),
    ]);
    let mut tracer = Recorder::default();

    assert_eq!(vm.call_with(0, &[], &mut tracer).unwrap(), 1);
    insta::assert_snapshot!(tracer.events.join("\n"), @r"
    call 2 -> 4
    break 5 (1)
    return 7 -> Some(3)
    return 3 -> None
    ");
}

#[test]
fn tracer_follows_symbol_call() {
    let image = ImageBuilder::new(vec![
        op(Opcode::Enter, 0),
        op(Opcode::Const, 9),
        op(Opcode::Leave, 0),
        op(Opcode::Enter, 8),
        op(Opcode::Const, 0),
        bare(Opcode::Call),
        op(Opcode::Leave, 8),
    ])
    .build()
    .unwrap();
    let mut vm = Vm::builder("named", NoSyscalls)
        .symbols(SymbolTable::from_pairs([(0, "nine"), (3, "outer")]))
        .build(&image)
        .unwrap();
    let mut tracer = Recorder::default();

    assert_eq!(vm.call_symbol_with("outer", &[], &mut tracer).unwrap(), 9);
    insta::assert_snapshot!(tracer.events.join("\n"), @r"
    call 5 -> 0
    return 2 -> Some(6)
    return 6 -> None
    ");

    let err = vm
        .call_symbol_with("inner", &[], &mut tracer)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalOperation);
    assert_eq!(vm.state(), VmState::Idle);
}
