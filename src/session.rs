//! Session: owns the shared [`Ctx`] and the SCoP records loaded from
//! one source, and is the only place the two-slot transaction
//! (`begin`/`apply`/`commit`/`rollback`) is exposed.

use tracing::{info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::frontend::Frontend;
use crate::kernel::Ctx;
use crate::scop::ScopRecord;
use crate::tree::{Cursor, LoopType, NodeType};

/// What happened to a commit attempt: legal commits swap the slots;
/// illegal ones leave `current` untouched and the scratch cursor
/// available for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    RolledBack,
}

pub struct Session {
    ctx: Ctx,
    config: SessionConfig,
    scops: Vec<ScopRecord>,
}

impl Session {
    /// `init_scops`: runs the front-end over `source_path` and
    /// populates one record per returned SCoP.
    #[instrument(skip(frontend, config))]
    pub fn init_scops(frontend: &dyn Frontend, source_path: &str, config: SessionConfig) -> CoreResult<Self> {
        let ctx = Ctx::new();
        let seeds = frontend.extract(source_path)?;
        if seeds.len() > config.max_scops {
            return Err(CoreError::InputError {
                path: source_path.into(),
                reason: format!("front-end reported {} SCoPs, over the configured limit of {}", seeds.len(), config.max_scops),
            });
        }
        info!(count = seeds.len(), "loaded SCoPs");
        let scops = seeds
            .into_iter()
            .map(|seed| ScopRecord::new(ctx.clone(), seed))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Session { ctx, config, scops })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    pub fn num_scops(&self) -> usize {
        self.scops.len()
    }

    /// `free_scops`: drops every record, releasing its allocations in
    /// the documented order.
    pub fn free_scops(&mut self) {
        self.scops.clear();
    }

    fn scop(&self, index: usize) -> CoreResult<&ScopRecord> {
        self.scops.get(index).ok_or(CoreError::NoSuchScop { index, count: self.scops.len() })
    }

    fn scop_mut(&mut self, index: usize) -> CoreResult<&mut ScopRecord> {
        let count = self.scops.len();
        self.scops.get_mut(index).ok_or(CoreError::NoSuchScop { index, count })
    }

    pub fn current(&self, index: usize) -> CoreResult<&Cursor> {
        Ok(self.scop(index)?.current())
    }

    /// Rejected-candidate inspection: the scratch cursor of the last
    /// failed commit, if nothing has called `begin` since.
    pub fn inspect_scratch(&self, index: usize) -> CoreResult<Option<&Cursor>> {
        Ok(self.scop(index)?.scratch())
    }

    pub fn is_dirty(&self, index: usize) -> CoreResult<bool> {
        Ok(self.scop(index)?.is_dirty())
    }

    // -- Navigation (pure) ------------------------------------------------

    pub fn goto_root(&mut self, index: usize) -> CoreResult<()> {
        self.scop_mut(index)?.navigate(|c| Ok(c.goto_root()))
    }

    pub fn goto_parent(&mut self, index: usize) -> CoreResult<()> {
        self.scop_mut(index)?.navigate(|c| c.goto_parent())
    }

    pub fn goto_child(&mut self, index: usize, child: usize) -> CoreResult<()> {
        self.scop_mut(index)?.navigate(|c| c.goto_child(child))
    }

    // -- Introspection -----------------------------------------------------

    pub fn get_type(&self, index: usize) -> CoreResult<NodeType> {
        Ok(self.scop(index)?.current().focused().node_type())
    }

    pub fn get_num_children(&self, index: usize) -> CoreResult<usize> {
        Ok(self.scop(index)?.current().focused().num_children())
    }

    pub fn get_expr(&self, index: usize) -> CoreResult<String> {
        Ok(crate::introspection::expr_text(self.scop(index)?.current().focused()))
    }

    pub fn get_loop_signature(&self, index: usize) -> CoreResult<crate::introspection::LoopSignature> {
        Ok(crate::introspection::loop_signature(self.scop(index)?.current().focused()))
    }

    pub fn print_schedule_node(&self, index: usize) -> CoreResult<String> {
        Ok(crate::introspection::dump_tree(self.scop(index)?.current().focused()))
    }

    // -- Transformation primitives, each its own begin/apply/commit -----

    /// Runs one primitive through the full two-slot transaction and
    /// reports what happened. Shared by every primitive below except
    /// `set_parallel` (parallel-oracle gate) and `set_loop_opt`
    /// (no gate at all).
    #[instrument(skip(self, primitive))]
    fn transact(
        &mut self,
        index: usize,
        name: &'static str,
        primitive: impl FnOnce(Cursor) -> CoreResult<Cursor>,
    ) -> CoreResult<CommitOutcome> {
        let record = self.scop_mut(index)?;
        record.begin();
        if let Err(e) = record.apply(primitive) {
            warn!(error = %e, primitive = name, "primitive rejected before commit");
            return Err(e);
        }
        if record.commit()? {
            Ok(CommitOutcome::Committed)
        } else {
            Ok(CommitOutcome::RolledBack)
        }
    }

    pub fn tile(&mut self, index: usize, tile_size: i64) -> CoreResult<CommitOutcome> {
        self.transact(index, "tile", |c| crate::primitives::tile(c, tile_size))
    }

    pub fn interchange(&mut self, index: usize) -> CoreResult<CommitOutcome> {
        self.transact(index, "interchange", crate::primitives::interchange)
    }

    pub fn fuse(&mut self, index: usize, i1: usize, i2: usize) -> CoreResult<CommitOutcome> {
        self.transact(index, "fuse", |c| crate::primitives::fuse(c, i1, i2))
    }

    pub fn scale(&mut self, index: usize, factor: i64) -> CoreResult<CommitOutcome> {
        self.transact(index, "scale", |c| crate::primitives::scale(c, factor))
    }

    pub fn partial_shift_val(&mut self, index: usize, pa_idx: usize, v: i64) -> CoreResult<CommitOutcome> {
        self.transact(index, "partial_shift_val", |c| crate::primitives::partial_shift_val(c, pa_idx, v))
    }

    pub fn full_shift_val(&mut self, index: usize, v: i64) -> CoreResult<CommitOutcome> {
        self.transact(index, "full_shift_val", |c| crate::primitives::full_shift_val(c, v))
    }

    pub fn partial_shift_var(&mut self, index: usize, pa_idx: usize, k: usize) -> CoreResult<CommitOutcome> {
        self.transact(index, "partial_shift_var", |c| crate::primitives::partial_shift_var(c, pa_idx, k))
    }

    pub fn full_shift_var(&mut self, index: usize, k: usize) -> CoreResult<CommitOutcome> {
        self.transact(index, "full_shift_var", |c| crate::primitives::full_shift_var(c, k))
    }

    /// `set_parallel`: gated by the parallel oracle variant, not the
    /// general legality oracle. `dim` is local to the focused band;
    /// the oracle's parallel variant expects an absolute depth counted
    /// from the tree root (see [`crate::tree::Cursor::composed_depth`]),
    /// so the band's ancestor depth is added before the check.
    #[instrument(skip(self))]
    pub fn set_parallel(&mut self, index: usize, dim: usize) -> CoreResult<CommitOutcome> {
        let base_depth = self.scop(index)?.current().composed_depth();
        let record = self.scop_mut(index)?;
        record.begin();
        record.apply(|c| crate::primitives::mark_parallel(c, dim))?;
        if record.commit_parallel(base_depth + dim)? {
            Ok(CommitOutcome::Committed)
        } else {
            Ok(CommitOutcome::RolledBack)
        }
    }

    /// `set_loop_opt`: an AST-build annotation, not gated by the
    /// oracle at all. Always commits.
    pub fn set_loop_opt(&mut self, index: usize, dim: usize, loop_type: LoopType) -> CoreResult<()> {
        let record = self.scop_mut(index)?;
        record.begin();
        record.apply(|c| crate::primitives::set_loop_type(c, dim, loop_type))?;
        record.commit_unconditional()?;
        Ok(())
    }

    /// Explicit rollback of an in-flight scratch, for drivers that want
    /// to abandon a primitive sequence before committing.
    pub fn rollback(&mut self, index: usize) -> CoreResult<()> {
        self.scop_mut(index)?.rollback();
        Ok(())
    }

    /// `generate_code`: walks every SCoP and either re-emits its
    /// untouched source text or asks `generator` to produce text for
    /// its (committed) schedule.
    pub fn generate_code(&self, generator: &dyn crate::frontend::CodeGenerator) -> CoreResult<String> {
        let mut out = String::new();
        for scop in &self.scops {
            if scop.is_dirty() {
                out.push_str(&generator.generate(&scop.statements, scop.current().root())?);
            } else {
                out.push_str(&scop.source_text);
            }
        }
        Ok(out)
    }
}
