pub mod kernel;
pub mod error;
pub mod tree;
pub mod dependence;
pub mod oracle;
pub mod primitives;
pub mod introspection;
pub mod frontend;
pub mod config;
pub mod scop;
pub mod session;
pub mod driver;

#[cfg(test)]
mod proptests;

pub use kernel::{AffineExpr, Ctx, Dim};
pub use error::{CoreError, CoreResult};
pub use tree::{Band, Cursor, LoopType, Node, NodeType, StmtId};
pub use dependence::{Dependence, DependenceEdge};
pub use oracle::Oracle;
pub use introspection::{LoopSignature, PieceSignature};
pub use frontend::{CodeGenerator, Frontend, ScopSeed, Statement};
pub use config::SessionConfig;
pub use session::{CommitOutcome, Session};
pub use driver::Driver;
