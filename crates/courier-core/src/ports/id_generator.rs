//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{ItemId, RunId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator produces item and run ids.
pub trait IdGenerator: Send + Sync {
    fn generate_item_id(&self) -> ItemId;

    fn generate_run_id(&self) -> RunId;
}

/// ULID generator whose timestamp part comes from a `Clock`.
///
/// With a `FixedClock` the timestamp part is deterministic; the random part
/// still keeps ids unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_item_id(&self) -> ItemId {
        ItemId::from(self.next_ulid())
    }

    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next_ulid())
    }
}
