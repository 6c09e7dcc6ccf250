//! Module compilation and the sandboxed instance lifecycle.
//!
//! [`Loader`] owns a compiled module together with its engine and configuration; it is
//! the factory for [`SandboxInstance`]s. Each instance owns its own store, so faults,
//! gas accounting and drive state never leak between instances. All guest execution is
//! funnelled through [`SandboxInstance::invoke`], which drives one message through the
//! guest's `handle` export and returns the typed [`ResultBundle`].

use core::fmt;

use wasmtime::{Config, Engine, Func, Linker, Memory, Module, Store, Val};

use crate::{
    constants::abi,
    drive::VirtualDrive,
    imports::{link_imports, HostState, OutOfGasFault},
    memory, Environment, Extensions, GasMeter, HandlerOutcome, InstantiationError, InvokeError,
    LoaderConfig, MemorySnapshot, Message, ModuleFormat, ResultBundle,
};

/// A compiled guest module, ready to be instantiated.
pub struct Loader {
    engine: Engine,
    module: Module,
    config: LoaderConfig,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Loader {
    /// Compiles `binary` under a fresh engine configured for `config`.
    ///
    /// Accepts both the WebAssembly binary format and the text format.
    pub fn new(binary: impl AsRef<[u8]>, config: LoaderConfig) -> Result<Self, InstantiationError> {
        let mut engine_config = Config::new();
        engine_config.async_support(true);
        if config.format == ModuleFormat::Wasm64 {
            engine_config.wasm_memory64(true);
        }
        let engine = Engine::new(&engine_config).map_err(InstantiationError::Engine)?;
        let module =
            Module::new(&engine, binary).map_err(InstantiationError::InvalidBinary)?;
        Self::from_module(engine, module, config)
    }

    /// Wraps an already-compiled module. The module must originate from `engine`.
    pub fn from_module(
        engine: Engine,
        module: Module,
        config: LoaderConfig,
    ) -> Result<Self, InstantiationError> {
        if config.extensions.contains(Extensions::DRIVE) && config.drive.is_none() {
            return Err(InstantiationError::MissingExtensionConfig("drive"));
        }
        Ok(Self { engine, module, config })
    }

    /// The engine this loader compiles and instantiates under.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The configuration every instance is created with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Creates a fresh sandboxed instance of the module.
    ///
    /// The instance starts with an untouched heap and a full gas budget; prior state is
    /// restored per call through [`SandboxInstance::invoke`].
    pub async fn instantiate(&self) -> Result<SandboxInstance, InstantiationError> {
        let mut linker = Linker::new(&self.engine);
        link_imports(&mut linker, &self.engine, self.config.format, self.config.extensions)?;

        let drive = match self.config.drive.clone() {
            Some(drive_config) if self.config.extensions.contains(Extensions::DRIVE) => {
                Some(VirtualDrive::new(drive_config)?)
            }
            _ => None,
        };

        let mut store = Store::new(&self.engine, HostState::new(&self.config, drive));
        store.limiter(|state| &mut state.limits);

        let instance = linker
            .instantiate_async(&mut store, &self.module)
            .await
            .map_err(InstantiationError::Linkage)?;

        let memory = instance
            .get_memory(&mut store, abi::EXPORT_MEMORY)
            .ok_or(InstantiationError::MissingExport(abi::EXPORT_MEMORY))?;
        let alloc = instance
            .get_func(&mut store, abi::EXPORT_ALLOC)
            .ok_or(InstantiationError::MissingExport(abi::EXPORT_ALLOC))?;
        let handle = instance
            .get_func(&mut store, abi::EXPORT_HANDLE)
            .ok_or(InstantiationError::MissingExport(abi::EXPORT_HANDLE))?;

        let format = self.config.format;
        expect_ptr_signature(&store, abi::EXPORT_ALLOC, alloc, format, 1)?;
        expect_ptr_signature(&store, abi::EXPORT_HANDLE, handle, format, 2)?;

        tracing::debug!(
            format = %format,
            compute_limit = self.config.compute_limit,
            memory_ceiling = self.config.memory_ceiling(),
            "instantiated guest module"
        );

        Ok(SandboxInstance {
            store,
            memory,
            alloc,
            handle,
            format,
            memory_ceiling: self.config.memory_ceiling(),
            accumulate_gas: self.config.accumulate_gas,
        })
    }
}

/// Validates that an exported function takes `arity` pointer-sized parameters and
/// returns one pointer-sized result.
fn expect_ptr_signature(
    store: &Store<HostState>,
    name: &'static str,
    func: Func,
    format: ModuleFormat,
    arity: usize,
) -> Result<(), InstantiationError> {
    let ty = func.ty(store);
    let ok = ty.params().len() == arity
        && ty.params().all(|param| format.matches_ptr(&param))
        && ty.results().len() == 1
        && ty.results().all(|result| format.matches_ptr(&result));
    if ok {
        Ok(())
    } else {
        Err(InstantiationError::BadSignature { name, format })
    }
}

/// One live sandbox: a store, the guest's memory and its entry points.
pub struct SandboxInstance {
    store: Store<HostState>,
    memory: Memory,
    alloc: Func,
    handle: Func,
    format: ModuleFormat,
    memory_ceiling: usize,
    accumulate_gas: bool,
}

impl fmt::Debug for SandboxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxInstance")
            .field("format", &self.format)
            .field("memory_ceiling", &self.memory_ceiling)
            .field("accumulate_gas", &self.accumulate_gas)
            .field("gas", &self.store.data().gas)
            .finish_non_exhaustive()
    }
}

impl SandboxInstance {
    /// Drives one message through the guest.
    ///
    /// Restores `prior` into the heap if given, resets the gas budget (unless gas
    /// accumulation is configured), dispatches the message and environment to the
    /// guest's `handle` export and decodes the reply. On success the returned bundle
    /// carries a full snapshot of the heap after the call.
    pub async fn invoke(
        &mut self,
        prior: Option<&MemorySnapshot>,
        message: &Message,
        environment: &Environment,
    ) -> Result<ResultBundle, InvokeError> {
        if let Some(snapshot) = prior {
            memory::load(&mut self.store, self.memory, snapshot, self.memory_ceiling)?;
        }
        if !self.accumulate_gas {
            self.store.data_mut().gas.refill(None);
        }

        let message_bytes = serde_json::to_vec(message)?;
        let environment_bytes = serde_json::to_vec(environment)?;
        let message_ptr = self.write_frame(&message_bytes).await?;
        let environment_ptr = self.write_frame(&environment_bytes).await?;

        let params = [self.format.ptr_val(message_ptr), self.format.ptr_val(environment_ptr)];
        let mut results = [Val::I32(0)];
        self.handle
            .call_async(&mut self.store, &params, &mut results)
            .await
            .map_err(classify_fault)?;
        let reply_ptr = self
            .format
            .val_to_ptr(&results[0])
            .ok_or_else(|| InvokeError::Decode("guest returned a non-pointer reply".to_owned()))?;

        let reply = self.read_frame(reply_ptr)?;
        let outcome: HandlerOutcome = serde_json::from_slice(&reply)?;
        let gas_used = self.store.data().gas.used();
        tracing::debug!(gas_used, ok = outcome.ok, "handler returned");

        if !outcome.ok {
            return Err(InvokeError::Handler(Box::new(outcome.response)));
        }
        let snapshot = memory::capture(&self.store, self.memory);
        Ok(ResultBundle::new(snapshot, outcome.response, gas_used))
    }

    /// The gas meter as of the last invocation.
    pub fn gas(&self) -> &GasMeter {
        &self.store.data().gas
    }

    /// Refills the gas budget: a `None` or zero amount resets the used counter, any
    /// other amount refunds that much.
    pub fn refill_gas(&mut self, amount: Option<u64>) {
        self.store.data_mut().gas.refill(amount)
    }

    /// Copies the current heap into an owned snapshot.
    pub fn snapshot(&self) -> MemorySnapshot {
        memory::capture(&self.store, self.memory)
    }

    /// Current heap size in bytes.
    pub fn heap_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Grows the heap to hold at least `bytes`. Shrinking is a no-op.
    pub fn resize_heap(&mut self, bytes: usize) -> Result<(), InvokeError> {
        memory::grow_to(&mut self.store, self.memory, bytes, self.memory_ceiling)
    }

    /// The drive overlay, when the extension is enabled.
    pub fn drive(&self) -> Option<&VirtualDrive> {
        self.store.data().drive.as_ref()
    }

    /// The binary flavor this instance runs.
    pub fn format(&self) -> ModuleFormat {
        self.format
    }

    /// Allocates guest memory and writes a length-prefixed frame into it.
    async fn write_frame(&mut self, payload: &[u8]) -> Result<u64, InvokeError> {
        let length = u32::try_from(payload.len())
            .map_err(|_| InvokeError::Decode("frame payload exceeds 4 GiB".to_owned()))?;
        let total = payload.len() + abi::FRAME_HEADER;

        let ptr = self.call_alloc(total).await?;
        let offset = usize::try_from(ptr)
            .map_err(|_| fault("allocator returned an unaddressable pointer"))?;

        let mut frame = Vec::with_capacity(total);
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(payload);
        self.memory
            .write(&mut self.store, offset, &frame)
            .map_err(|_| fault("allocator returned an out-of-bounds pointer"))?;
        Ok(ptr)
    }

    /// Calls the guest allocator for a block of `len` bytes.
    async fn call_alloc(&mut self, len: usize) -> Result<u64, InvokeError> {
        let params = [self.format.ptr_val(len as u64)];
        let mut results = [Val::I32(0)];
        self.alloc
            .call_async(&mut self.store, &params, &mut results)
            .await
            .map_err(classify_fault)?;
        self.format
            .val_to_ptr(&results[0])
            .ok_or_else(|| fault("allocator returned a non-pointer value"))
    }

    /// Reads a length-prefixed reply frame out of guest memory.
    fn read_frame(&self, ptr: u64) -> Result<Vec<u8>, InvokeError> {
        if ptr == 0 {
            return Err(InvokeError::Decode("guest returned a null reply pointer".to_owned()));
        }
        let start = usize::try_from(ptr)
            .map_err(|_| InvokeError::Decode("reply pointer is unaddressable".to_owned()))?;
        let data = self.memory.data(&self.store);

        let body_start = start
            .checked_add(abi::FRAME_HEADER)
            .ok_or_else(|| InvokeError::Decode("reply frame header overflows".to_owned()))?;
        let header = data
            .get(start..body_start)
            .ok_or_else(|| InvokeError::Decode("reply frame header out of bounds".to_owned()))?;
        let mut length = [0u8; abi::FRAME_HEADER];
        length.copy_from_slice(header);

        let body_end = body_start
            .checked_add(u32::from_le_bytes(length) as usize)
            .ok_or_else(|| InvokeError::Decode("reply frame length overflows".to_owned()))?;
        let body = data
            .get(body_start..body_end)
            .ok_or_else(|| InvokeError::Decode("reply frame body out of bounds".to_owned()))?;
        Ok(body.to_vec())
    }
}

/// Maps a guest fault to the invocation error it represents.
///
/// Gas exhaustion travels through the unwound guest stack as [`OutOfGasFault`]; every
/// other fault (traps, memory violations, unexpected host errors) is opaque.
fn classify_fault(err: wasmtime::Error) -> InvokeError {
    if err.downcast_ref::<OutOfGasFault>().is_some() {
        InvokeError::OutOfGas
    } else {
        InvokeError::Fault(err)
    }
}

fn fault(message: &str) -> InvokeError {
    InvokeError::Fault(wasmtime::Error::msg(message.to_owned()))
}
