//! Host-side import surface linked into every guest instance.
//!
//! Three import modules exist: `metering` (gas accounting), `env` (the injected
//! determinism capabilities) and, when the extension is enabled, `drive`. All state the
//! imports touch lives in [`HostState`], owned by the instance's store; nothing is
//! process-global.

use std::sync::Arc;

use wasmtime::{
    Caller, Engine, Extern, FuncType, Linker, Memory, StoreLimits, StoreLimitsBuilder, Val,
    ValType,
};

use crate::{
    constants::abi,
    drive::{DriveError, VirtualDrive},
    Clock, Extensions, GasMeter, InstantiationError, LoaderConfig, ModuleFormat, RandomSource,
};

/// Per-instance host state: the gas meter, the injected capabilities, the optional drive
/// and the store's resource limiter.
pub(crate) struct HostState {
    pub(crate) gas: GasMeter,
    pub(crate) random: Arc<dyn RandomSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) drive: Option<VirtualDrive>,
    pub(crate) limits: StoreLimits,
}

impl HostState {
    pub(crate) fn new(config: &LoaderConfig, drive: Option<VirtualDrive>) -> Self {
        Self {
            gas: GasMeter::new(config.compute_limit),
            random: config.random.clone(),
            clock: config.clock.clone(),
            drive,
            limits: StoreLimitsBuilder::new().memory_size(config.memory_ceiling()).build(),
        }
    }
}

/// Marker error raised by the metering import when the budget is exhausted.
///
/// Carried inside [`wasmtime::Error`] through the unwound guest stack and recovered by
/// downcast at the invocation boundary.
#[derive(Debug, thiserror::Error)]
#[error("out of gas")]
pub(crate) struct OutOfGasFault;

/// Registers every host import the given configuration calls for.
pub(crate) fn link_imports(
    linker: &mut Linker<HostState>,
    engine: &Engine,
    format: ModuleFormat,
    extensions: Extensions,
) -> Result<(), InstantiationError> {
    linker
        .func_wrap(
            abi::METERING_MODULE,
            abi::USEGAS,
            |mut caller: Caller<'_, HostState>, amount: i64| -> Result<(), wasmtime::Error> {
                let gas = &mut caller.data_mut().gas;
                gas.charge(amount.max(0) as u64);
                if gas.is_exhausted() {
                    return Err(OutOfGasFault.into());
                }
                Ok(())
            },
        )
        .map_err(InstantiationError::Linkage)?;

    linker
        .func_wrap(abi::ENV_MODULE, abi::RANDOM_F64, |caller: Caller<'_, HostState>| -> f64 {
            caller.data().random.next_f64()
        })
        .map_err(InstantiationError::Linkage)?;

    linker
        .func_wrap(abi::ENV_MODULE, abi::CLOCK_MS, |caller: Caller<'_, HostState>| -> i64 {
            caller.data().clock.now_ms()
        })
        .map_err(InstantiationError::Linkage)?;

    if extensions.contains(Extensions::DRIVE) {
        link_drive(linker, engine, format)?;
    }

    Ok(())
}

/// Registers the `drive` import module.
///
/// Failures inside these imports never trap the guest: denial and fetch errors are
/// reported through the ABI sentinels (`open` returning `0`, `read` returning `-1`).
/// Only malformed guest pointers trap.
fn link_drive(
    linker: &mut Linker<HostState>,
    engine: &Engine,
    format: ModuleFormat,
) -> Result<(), InstantiationError> {
    let ptr = format.ptr_ty();

    let open_ty = FuncType::new(engine, [ptr.clone(), ptr.clone()], [ValType::I32]);
    linker
        .func_new(abi::DRIVE_MODULE, abi::DRIVE_OPEN, open_ty, move |mut caller, params, results| {
            let (path_ptr, path_len) = ptr_pair(format, params, 0)?;
            let memory = guest_memory(&mut caller)?;
            let path = read_guest_string(&caller, memory, path_ptr, path_len)?;
            let fd = match caller.data_mut().drive.as_mut() {
                Some(drive) => drive.open(&path).unwrap_or(0),
                None => 0,
            };
            write_result(results, Val::I32(fd as i32));
            Ok(())
        })
        .map_err(InstantiationError::Linkage)?;

    let read_ty = FuncType::new(engine, [ValType::I32, ptr.clone(), ptr.clone()], [ptr]);
    linker
        .func_new_async(
            abi::DRIVE_MODULE,
            abi::DRIVE_READ,
            read_ty,
            move |mut caller, params, results| {
                Box::new(async move {
                    let fd = i32_arg(params, 0)? as u32;
                    let (dst_ptr, dst_len) = ptr_pair(format, params, 1)?;
                    let memory = guest_memory(&mut caller)?;
                    let outcome = match caller.data_mut().drive.as_mut() {
                        Some(drive) => drive.read_chunk(fd, dst_len as usize).await,
                        None => Err(DriveError::BadDescriptor(fd)),
                    };
                    let written: i64 = match outcome {
                        Ok(chunk) => {
                            memory.write(&mut caller, dst_ptr as usize, &chunk)?;
                            chunk.len() as i64
                        }
                        Err(err) => {
                            tracing::warn!(fd, %err, "drive read failed");
                            -1
                        }
                    };
                    write_result(results, format.ptr_val(written as u64));
                    Ok(())
                })
            },
        )
        .map_err(InstantiationError::Linkage)?;

    let close_ty = FuncType::new(engine, [ValType::I32], [ValType::I32]);
    linker
        .func_new(abi::DRIVE_MODULE, abi::DRIVE_CLOSE, close_ty, |mut caller, params, results| {
            let fd = i32_arg(params, 0)? as u32;
            if let Some(drive) = caller.data_mut().drive.as_mut() {
                drive.close(fd);
            }
            write_result(results, Val::I32(0));
            Ok(())
        })
        .map_err(InstantiationError::Linkage)?;

    Ok(())
}

/// The guest's exported linear memory, looked up through the calling instance.
fn guest_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory, wasmtime::Error> {
    caller
        .get_export(abi::EXPORT_MEMORY)
        .and_then(Extern::into_memory)
        .ok_or_else(|| wasmtime::Error::msg("guest does not export its linear memory"))
}

/// Copies a guest string out of linear memory, validating the pointer range.
fn read_guest_string(
    caller: &Caller<'_, HostState>,
    memory: Memory,
    ptr: u64,
    len: u64,
) -> Result<String, wasmtime::Error> {
    let start = usize::try_from(ptr)?;
    let count = usize::try_from(len)?;
    let end = start
        .checked_add(count)
        .ok_or_else(|| wasmtime::Error::msg("guest pointer range overflows"))?;
    let bytes = memory
        .data(caller)
        .get(start..end)
        .ok_or_else(|| wasmtime::Error::msg("guest pointer range is out of bounds"))?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Two consecutive pointer-sized arguments starting at `index`.
fn ptr_pair(
    format: ModuleFormat,
    params: &[Val],
    index: usize,
) -> Result<(u64, u64), wasmtime::Error> {
    let first = params
        .get(index)
        .and_then(|val| format.val_to_ptr(val))
        .ok_or_else(|| wasmtime::Error::msg("malformed pointer argument"))?;
    let second = params
        .get(index + 1)
        .and_then(|val| format.val_to_ptr(val))
        .ok_or_else(|| wasmtime::Error::msg("malformed pointer argument"))?;
    Ok((first, second))
}

fn i32_arg(params: &[Val], index: usize) -> Result<i32, wasmtime::Error> {
    match params.get(index) {
        Some(Val::I32(value)) => Ok(*value),
        _ => Err(wasmtime::Error::msg("malformed i32 argument")),
    }
}

fn write_result(results: &mut [Val], value: Val) {
    if let Some(slot) = results.first_mut() {
        *slot = value;
    }
}
