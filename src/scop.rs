//! One SCoP's record: its immutable statement metadata, its cached
//! dependence relation, and the current/scratch cursor pair that the
//! session manager's two-slot transaction operates on.

use tracing::{debug, instrument};

use crate::dependence::Dependence;
use crate::error::{CoreError, CoreResult};
use crate::frontend::{ScopSeed, Statement};
use crate::kernel::Ctx;
use crate::oracle::Oracle;
use crate::tree::Cursor;

pub struct ScopRecord {
    ctx: Ctx,
    pub statements: Vec<Statement>,
    pub dependence: Dependence,
    pub source_text: String,
    current: Cursor,
    scratch: Option<Cursor>,
    dirty: bool,
}

impl ScopRecord {
    pub fn new(ctx: Ctx, seed: ScopSeed) -> CoreResult<Self> {
        let current = Cursor::new(seed.schedule)?;
        // One allocation each for the statement list, the dependence
        // relation, and the current cursor, in their release order.
        ctx.alloc();
        ctx.alloc();
        ctx.alloc();
        Ok(ScopRecord {
            ctx,
            statements: seed.statements,
            dependence: seed.dependence,
            source_text: seed.source_text,
            current,
            scratch: None,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn current(&self) -> &Cursor {
        &self.current
    }

    pub fn scratch(&self) -> Option<&Cursor> {
        self.scratch.as_ref()
    }

    /// Pure navigation on the current cursor. Never touches the
    /// scratch slot and never fails halfway: `self.current` is only
    /// overwritten once `f` has succeeded.
    pub fn navigate(&mut self, f: impl FnOnce(Cursor) -> CoreResult<Cursor>) -> CoreResult<()> {
        self.current = f(self.current.clone())?;
        Ok(())
    }

    /// `begin`: release any in-flight scratch and copy the current
    /// cursor into it.
    pub fn begin(&mut self) {
        if self.scratch.take().is_some() {
            self.ctx.release();
        }
        self.ctx.alloc();
        self.scratch = Some(self.current.clone());
    }

    /// `apply`: run one primitive against the scratch cursor. On a
    /// precondition violation the scratch slot is left empty, and the
    /// next `begin` repopulates it; the scratch allocation `begin` made
    /// is released here rather than leaked, since no cursor survives to
    /// carry it forward.
    pub fn apply(&mut self, f: impl FnOnce(Cursor) -> CoreResult<Cursor>) -> CoreResult<()> {
        let scratch = self.scratch.take().ok_or(CoreError::NoScratch { operation: "apply" })?;
        match f(scratch) {
            Ok(new_scratch) => {
                self.scratch = Some(new_scratch);
                Ok(())
            }
            Err(e) => {
                self.ctx.release();
                Err(e)
            }
        }
    }

    /// `commit` using the general oracle. A legal commit collapses the
    /// current/scratch pair down to one surviving allocation (the
    /// scratch, now `current`), so `begin`'s scratch alloc is released
    /// here to balance it.
    #[instrument(skip(self))]
    pub fn commit(&mut self) -> CoreResult<bool> {
        let scratch = self.scratch.as_ref().ok_or(CoreError::NoScratch { operation: "commit" })?;
        let legal = Oracle::is_legal(scratch.root(), &self.dependence)?;
        debug!(legal, "commit");
        if legal {
            self.current = self.scratch.take().unwrap();
            self.ctx.release();
            self.dirty = true;
        }
        Ok(legal)
    }

    /// `commit` gated by the parallel oracle variant instead of the
    /// general one, used only by `set_parallel`.
    #[instrument(skip(self))]
    pub fn commit_parallel(&mut self, depth: usize) -> CoreResult<bool> {
        let scratch = self.scratch.as_ref().ok_or(CoreError::NoScratch { operation: "commit" })?;
        let legal = Oracle::is_parallel_at_depth(scratch.root(), &self.dependence, depth)?;
        debug!(legal, depth, "commit_parallel");
        if legal {
            self.current = self.scratch.take().unwrap();
            self.ctx.release();
            self.dirty = true;
        }
        Ok(legal)
    }

    /// Unconditional commit for annotations the oracle has no opinion
    /// on (`set_loop_opt` always reports success).
    pub fn commit_unconditional(&mut self) -> CoreResult<bool> {
        let scratch = self.scratch.take().ok_or(CoreError::NoScratch { operation: "commit" })?;
        self.current = scratch;
        self.ctx.release();
        self.dirty = true;
        Ok(true)
    }

    /// `rollback`: discard the in-flight scratch, leaving `current`
    /// exactly as it was before `begin`.
    pub fn rollback(&mut self) {
        if self.scratch.take().is_some() {
            self.ctx.release();
        }
    }
}

impl Drop for ScopRecord {
    fn drop(&mut self) {
        // Release order: statement list, dependence, scratch, current.
        // Then the SCoP record itself goes away.
        self.ctx.release(); // statements
        self.ctx.release(); // dependence
        if self.scratch.take().is_some() {
            self.ctx.release();
        }
        self.ctx.release(); // current
    }
}
