//! The flat, index-addressed surface an external driver (a search
//! process, or an interactive prompt) uses to invoke operations by
//! SCoP index rather than hold typed cursors itself.
//!
//! [`Session`] already provides the typed API; `Driver` is a thin
//! wrapper translating it into this shape, including the `1`/`0`
//! legal/rolled-back convention.

use std::fs;

use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::frontend::{CodeGenerator, Frontend};
use crate::introspection::LoopSignature;
use crate::session::{CommitOutcome, Session};
use crate::tree::{LoopType, NodeType};

fn as_int(outcome: CommitOutcome) -> i32 {
    match outcome {
        CommitOutcome::Committed => 1,
        CommitOutcome::RolledBack => 0,
    }
}

/// Owns at most one active [`Session`] plus the front-end/code-generator
/// pair it was constructed with.
pub struct Driver<F: Frontend, G: CodeGenerator> {
    frontend: F,
    generator: G,
    config: SessionConfig,
    session: Option<Session>,
}

impl<F: Frontend, G: CodeGenerator> Driver<F, G> {
    pub fn new(frontend: F, generator: G, config: SessionConfig) -> Self {
        Driver { frontend, generator, config, session: None }
    }

    fn session(&self) -> CoreResult<&Session> {
        self.session.as_ref().ok_or(CoreError::NoSuchScop { index: 0, count: 0 })
    }

    fn session_mut(&mut self) -> CoreResult<&mut Session> {
        self.session.as_mut().ok_or(CoreError::NoSuchScop { index: 0, count: 0 })
    }

    /// `init_scops(path)` → number of SCoPs loaded.
    pub fn init_scops(&mut self, path: &str) -> CoreResult<usize> {
        let session = Session::init_scops(&self.frontend, path, self.config.clone())?;
        let n = session.num_scops();
        self.session = Some(session);
        Ok(n)
    }

    /// `free_scops()`.
    pub fn free_scops(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.free_scops();
        }
        self.session = None;
    }

    pub fn get_type(&self, i: usize) -> CoreResult<NodeType> {
        self.session()?.get_type(i)
    }

    pub fn get_num_children(&self, i: usize) -> CoreResult<usize> {
        self.session()?.get_num_children(i)
    }

    pub fn get_expr(&self, i: usize) -> CoreResult<String> {
        self.session()?.get_expr(i)
    }

    pub fn get_loop_signature(&self, i: usize) -> CoreResult<LoopSignature> {
        self.session()?.get_loop_signature(i)
    }

    pub fn print_schedule_node(&self, i: usize) -> CoreResult<String> {
        self.session()?.print_schedule_node(i)
    }

    pub fn goto_root(&mut self, i: usize) -> CoreResult<()> {
        self.session_mut()?.goto_root(i)
    }

    pub fn goto_parent(&mut self, i: usize) -> CoreResult<()> {
        self.session_mut()?.goto_parent(i)
    }

    pub fn goto_child(&mut self, i: usize, k: usize) -> CoreResult<()> {
        self.session_mut()?.goto_child(i, k)
    }

    pub fn tile(&mut self, i: usize, tile_size: i64) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.tile(i, tile_size)?))
    }

    pub fn interchange(&mut self, i: usize) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.interchange(i)?))
    }

    pub fn fuse(&mut self, i: usize, i1: usize, i2: usize) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.fuse(i, i1, i2)?))
    }

    pub fn scale(&mut self, i: usize, factor: i64) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.scale(i, factor)?))
    }

    pub fn partial_shift_val(&mut self, i: usize, pa_idx: usize, v: i64) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.partial_shift_val(i, pa_idx, v)?))
    }

    pub fn full_shift_val(&mut self, i: usize, v: i64) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.full_shift_val(i, v)?))
    }

    pub fn partial_shift_var(&mut self, i: usize, pa_idx: usize, k: usize) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.partial_shift_var(i, pa_idx, k)?))
    }

    pub fn full_shift_var(&mut self, i: usize, k: usize) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.full_shift_var(i, k)?))
    }

    /// `set_parallel(i)` → `1`/`0`, gated by the parallel oracle variant
    /// at the band dimension `dim` currently in focus.
    pub fn set_parallel(&mut self, i: usize, dim: usize) -> CoreResult<i32> {
        Ok(as_int(self.session_mut()?.set_parallel(i, dim)?))
    }

    /// `set_loop_opt(i, pos, opt)` → always `1`.
    pub fn set_loop_opt(&mut self, i: usize, dim: usize, loop_type: LoopType) -> CoreResult<i32> {
        self.session_mut()?.set_loop_opt(i, dim, loop_type)?;
        Ok(1)
    }

    /// `generate_code(in_path, out_path)` → `0` on success, non-zero
    /// (via `Err`) on a front-end/output error.
    pub fn generate_code(&self, out_path: &str) -> CoreResult<i32> {
        let text = self.session()?.generate_code(&self.generator)?;
        fs::write(out_path, text).map_err(|e| CoreError::OutputError { path: out_path.into(), reason: e.to_string() })?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::toy::{ToyCodeGenerator, ToyFrontend};

    fn driver() -> Driver<ToyFrontend, ToyCodeGenerator> {
        Driver::new(ToyFrontend, ToyCodeGenerator, SessionConfig::default())
    }

    #[test]
    fn init_scops_reports_the_loaded_count() {
        let mut d = driver();
        assert_eq!(d.init_scops("gemm.c").unwrap(), 1);
    }

    #[test]
    fn operations_before_init_scops_error() {
        let d = driver();
        assert!(d.get_type(0).is_err());
    }

    #[test]
    fn tile_then_generate_code_writes_a_file() {
        let mut d = driver();
        d.init_scops("gemm.c").unwrap();
        d.goto_child(0, 0).unwrap();
        d.goto_child(0, 0).unwrap();
        assert_eq!(d.tile(0, 16).unwrap(), 1);
        let path = std::env::temp_dir().join("polysched_driver_test_output.c");
        let path_str = path.to_str().unwrap();
        assert_eq!(d.generate_code(path_str).unwrap(), 0);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("for (int"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn set_loop_opt_always_reports_one() {
        let mut d = driver();
        d.init_scops("gemm.c").unwrap();
        d.goto_child(0, 0).unwrap();
        d.goto_child(0, 0).unwrap();
        assert_eq!(d.set_loop_opt(0, 0, LoopType::Unroll).unwrap(), 1);
    }

    #[test]
    fn free_scops_then_reinit_starts_clean() {
        let mut d = driver();
        d.init_scops("gemm.c").unwrap();
        d.free_scops();
        assert!(d.get_type(0).is_err());
        assert_eq!(d.init_scops("two_loops.c").unwrap(), 1);
    }
}
