//! NVRTC compilation and per-device module cache.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use cudarc::driver::{CudaDevice, CudaFunction};
use parking_lot::Mutex;

use super::context::CudaError;

/// Loaded modules, keyed by (device index, module name).
static LOADED: OnceLock<Mutex<HashSet<(usize, String)>>> = OnceLock::new();

fn loaded_set() -> &'static Mutex<HashSet<(usize, String)>> {
    LOADED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Compile and load `source` as `module_name` on the device unless already loaded.
pub fn ensure_module(
    device: &Arc<CudaDevice>,
    device_idx: usize,
    module_name: &str,
    source: &str,
    func_names: &'static [&'static str],
) -> Result<(), CudaError> {
    let key = (device_idx, module_name.to_string());
    let mut set = loaded_set().lock();
    if set.contains(&key) {
        return Ok(());
    }

    tracing::debug!(device = device_idx, module = module_name, "compiling CUDA module");
    let ptx = cudarc::nvrtc::compile_ptx(source).map_err(|e| CudaError::PtxCompile {
        module: module_name.to_string(),
        msg: e.to_string(),
    })?;

    device
        .load_ptx(ptx, module_name, func_names)
        .map_err(|e| CudaError::ModuleLoad {
            module: module_name.to_string(),
            msg: e.to_string(),
        })?;

    set.insert(key);
    Ok(())
}

/// Get a kernel function handle, loading its module if needed.
pub fn get_or_load_func(
    device: &Arc<CudaDevice>,
    device_idx: usize,
    module_name: &str,
    func_name: &str,
    source: &str,
    func_names: &'static [&'static str],
) -> Result<CudaFunction, CudaError> {
    ensure_module(device, device_idx, module_name, source, func_names)?;
    device
        .get_func(module_name, func_name)
        .ok_or_else(|| CudaError::FuncNotFound {
            module: module_name.to_string(),
            func: func_name.to_string(),
        })
}

/// Same geometry, in the driver's type.
pub fn to_cuda_config(cfg: simtk_core::LaunchConfig) -> cudarc::driver::LaunchConfig {
    cudarc::driver::LaunchConfig {
        grid_dim: cfg.grid_dim,
        block_dim: cfg.block_dim,
        shared_mem_bytes: cfg.shared_mem_bytes,
    }
}
