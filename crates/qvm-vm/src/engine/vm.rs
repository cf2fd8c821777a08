//! Virtual machine instances: image loading and the host-facing API.

use qvm_bytecode::{
    ByteOrder, Code, DEFAULT_MIN_DATA_SIZE, DEFAULT_STACK_SIZE, Image, ModuleError, SymbolTable,
    VerifyLimits, verify,
};

use super::error::{Error, RuntimeError};
use super::memory::DataSegment;
use super::stack::OperandStack;
use super::syscall::SystemCalls;
use super::trace::{NoopTracer, Tracer};

/// Default operand stack capacity in slots.
const DEFAULT_OP_STACK_SIZE: usize = 1024;

/// Largest data segment: addresses are 32-bit and offsets fit in `i32`.
const MAX_DATA_SIZE: u64 = 1 << 31;

/// Runtime limits for bytecode execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuelLimits {
    /// Instructions per outermost call (default: 100,000,000).
    pub(crate) exec_fuel: u64,
    /// Maximum `ENTER` frame depth (default: 1,024).
    pub(crate) recursion_limit: u32,
    /// Maximum nested host-to-VM invocations (default: 64).
    pub(crate) max_call_level: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 100_000_000,
            recursion_limit: 1024,
            max_call_level: 64,
        }
    }
}

impl FuelLimits {
    /// Create new fuel limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u64) -> Self {
        self.exec_fuel = fuel;
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Set the nested call limit.
    pub fn max_call_level(mut self, level: u32) -> Self {
        self.max_call_level = level;
        self
    }

    pub fn get_exec_fuel(&self) -> u64 {
        self.exec_fuel
    }
    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
    pub fn get_max_call_level(&self) -> u32 {
        self.max_call_level
    }
}

/// Execution state of a VM instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VmState {
    /// No invocation in progress.
    #[default]
    Idle,
    Running,
    /// Control is in the host's syscall handler.
    InSyscall,
    /// A call failed; every later call is refused.
    Faulted,
}

/// Everything the interpreter touches, split from the host so that a
/// syscall handler can borrow both at once.
#[derive(Debug)]
pub(crate) struct Machine {
    pub(crate) name: String,
    pub(crate) code: Code,
    pub(crate) memory: DataSegment,
    pub(crate) stack: OperandStack,

    /// Byte offset of the current frame in the data segment.
    pub(crate) program_stack: u32,
    pub(crate) stack_bottom: u32,
    pub(crate) stack_top: u32,

    pub(crate) call_level: u32,
    pub(crate) frame_depth: u32,
    pub(crate) fuel: u64,
    pub(crate) limits: FuelLimits,
    pub(crate) state: VmState,
    /// Instruction index of the last fault, for diagnostics.
    pub(crate) fault_pc: Option<usize>,

    pub(crate) break_function: Option<usize>,
    pub(crate) break_count: u64,
    pub(crate) symbols: SymbolTable,
    pub(crate) profile: bool,
}

/// A loaded module bound to its host.
pub struct Vm<H> {
    machine: Machine,
    host: H,
}

/// Builder for VM instances.
pub struct VmBuilder<H> {
    name: String,
    host: H,
    byte_order: ByteOrder,
    stack_size: usize,
    min_data_size: usize,
    op_stack_size: usize,
    limits: FuelLimits,
    break_function: Option<usize>,
    symbols: SymbolTable,
    profile: bool,
}

impl<H: SystemCalls> VmBuilder<H> {
    /// Create a new VM builder.
    pub fn new(name: impl Into<String>, host: H) -> Self {
        Self {
            name: name.into(),
            host,
            byte_order: ByteOrder::Little,
            stack_size: DEFAULT_STACK_SIZE,
            min_data_size: DEFAULT_MIN_DATA_SIZE,
            op_stack_size: DEFAULT_OP_STACK_SIZE,
            limits: FuelLimits::default(),
            break_function: None,
            symbols: SymbolTable::new(),
            profile: false,
        }
    }

    /// Byte order of the image (default: little-endian).
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Set the program stack size in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Set the minimum data segment allocation in bytes.
    pub fn min_data_size(mut self, bytes: usize) -> Self {
        self.min_data_size = bytes;
        self
    }

    /// Set the operand stack capacity in slots.
    pub fn op_stack_size(mut self, slots: usize) -> Self {
        self.op_stack_size = slots;
        self
    }

    /// Set the fuel limits.
    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u64) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.limits = self.limits.recursion_limit(limit);
        self
    }

    /// Count entries to the function at `pc` as breakpoints.
    pub fn break_function(mut self, pc: usize) -> Self {
        self.break_function = Some(pc);
        self
    }

    /// Attach debug symbols.
    pub fn symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }

    /// Count calls per symbol.
    pub fn profile(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    /// Load and verify `image`, allocating every runtime segment.
    pub fn build(self, image: &[u8]) -> Result<Vm<H>, Error> {
        let image = Image::parse(image, self.byte_order)?;
        let header = image.header();

        // Header lengths are non-negative i32s; only the builder sizes can overflow.
        let stack_size = u64::try_from(self.stack_size).unwrap_or(u64::MAX);
        let min_data_size = u64::try_from(self.min_data_size).unwrap_or(u64::MAX);
        let needed = (header.data_length as u64 + header.bss_length as u64)
            .saturating_add(stack_size)
            .max(min_data_size);
        let size = needed
            .checked_next_power_of_two()
            .filter(|&size| size <= MAX_DATA_SIZE)
            .ok_or(ModuleError::SegmentTooLarge(needed))?;
        // size >= stack_size and size <= 2^31, so both fit in u32 below.
        let size = size as usize;

        let limits = VerifyLimits {
            stack_size: self.stack_size,
            data_size: size,
        };
        let code = verify(image.code(), image.instruction_count(), self.byte_order, limits)
            .map_err(ModuleError::from)?;

        let mut memory = DataSegment::new(size);
        let data = image.data();
        let bytes = memory.as_bytes_mut();
        bytes[..data.len()].copy_from_slice(data);
        if self.byte_order.needs_swap() {
            ByteOrder::swap_words(&mut bytes[image.lit_length()..data.len()]);
        }

        tracing::debug!(
            vm = %self.name,
            instructions = code.len(),
            data = data.len(),
            bss = image.bss_length(),
            data_size = size,
            stack_size = self.stack_size,
            "loaded image"
        );

        let stack_top = size as u32;
        let machine = Machine {
            name: self.name,
            code,
            memory,
            stack: OperandStack::new(self.op_stack_size),
            program_stack: stack_top,
            stack_bottom: stack_top - self.stack_size as u32,
            stack_top,
            call_level: 0,
            frame_depth: 0,
            fuel: self.limits.exec_fuel,
            limits: self.limits,
            state: VmState::Idle,
            fault_pc: None,
            break_function: self.break_function,
            break_count: 0,
            symbols: self.symbols,
            profile: self.profile,
        };

        Ok(Vm {
            machine,
            host: self.host,
        })
    }
}

impl<H: SystemCalls> Vm<H> {
    /// Load `image` with default options.
    pub fn create(image: &[u8], name: impl Into<String>, host: H) -> Result<Self, Error> {
        VmBuilder::new(name, host).build(image)
    }

    /// Create a VM builder.
    pub fn builder(name: impl Into<String>, host: H) -> VmBuilder<H> {
        VmBuilder::new(name, host)
    }

    /// Run the function at instruction `target` with up to 13 arguments and
    /// return its result.
    pub fn call(&mut self, target: i32, args: &[i32]) -> Result<i32, Error> {
        self.call_with(target, args, &mut NoopTracer)
    }

    /// Like [`Vm::call`], reporting execution to `tracer`.
    pub fn call_with<T: Tracer>(
        &mut self,
        target: i32,
        args: &[i32],
        tracer: &mut T,
    ) -> Result<i32, Error> {
        Ok(self.machine.invoke(&mut self.host, target, args, tracer)?)
    }

    /// Run the function named `name` in the symbol table.
    pub fn call_symbol(&mut self, name: &str, args: &[i32]) -> Result<i32, Error> {
        self.call_symbol_with(name, args, &mut NoopTracer)
    }

    /// Like [`Vm::call_symbol`], reporting execution to `tracer`.
    ///
    /// An unknown name fails without faulting the VM.
    pub fn call_symbol_with<T: Tracer>(
        &mut self,
        name: &str,
        args: &[i32],
        tracer: &mut T,
    ) -> Result<i32, Error> {
        let Some(symbol) = self.machine.symbols.find(name) else {
            return Err(RuntimeError::UnknownSymbol(name.to_owned()).into());
        };
        let target = symbol.address as i32;
        self.call_with(target, args, tracer)
    }

    /// Release the instance, handing back the host.
    pub fn free(self) -> H {
        tracing::debug!(vm = %self.machine.name, "freed");
        self.host
    }
}

impl<H> Vm<H> {
    pub fn name(&self) -> &str {
        &self.machine.name
    }

    pub fn state(&self) -> VmState {
        self.machine.state
    }

    pub fn code(&self) -> &Code {
        &self.machine.code
    }

    /// The data segment, for host-side address translation between calls.
    pub fn memory(&self) -> &DataSegment {
        &self.machine.memory
    }

    pub fn memory_mut(&mut self) -> &mut DataSegment {
        &mut self.machine.memory
    }

    /// `BREAK` executions plus entries to the break function.
    pub fn break_count(&self) -> u64 {
        self.machine.break_count
    }

    /// Debug symbols, with call counts when profiling.
    pub fn symbols(&self) -> &SymbolTable {
        &self.machine.symbols
    }

    pub fn limits(&self) -> FuelLimits {
        self.machine.limits
    }

    /// Program stack range `[bottom, top)` in the data segment.
    pub fn stack_range(&self) -> std::ops::Range<u32> {
        self.machine.stack_bottom..self.machine.stack_top
    }

    /// Instruction index of the most recent fault.
    pub fn fault_pc(&self) -> Option<usize> {
        self.machine.fault_pc
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
