//! Per-operation strategy table.
//!
//! Resolved once when the facade is built. An operation keeps the same
//! strategy for the lifetime of the table; operations neither strategy
//! supports have no entry and are reported as unimplemented.

use std::fmt;
use std::sync::Arc;

use vposix_config::{log_facade_warn, StrategyMode};

use crate::strategy::{Op, Strategy};

pub struct DispatchTable {
    slots: [Option<Arc<dyn Strategy>>; Op::COUNT],
}

impl DispatchTable {
    /// Bind every [`Op`] according to `mode`.
    ///
    /// `Auto` and `Native` prefer the native strategy and use the fallback
    /// for whatever it cannot do; `Fallback` prefers the fallback.
    pub fn resolve(
        mode: StrategyMode,
        native: Option<Arc<dyn Strategy>>,
        fallback: Arc<dyn Strategy>,
    ) -> Self {
        if mode == StrategyMode::Native && native.is_none() {
            log_facade_warn!("native strategy requested but unavailable, using fallback");
        }
        let prefer_fallback = mode == StrategyMode::Fallback;

        let slots = std::array::from_fn(|i| {
            let op = Op::ALL[i];
            let native = native.as_ref().filter(|s| s.supports(op));
            let fallback = Some(&fallback).filter(|s| s.supports(op));
            let chosen = if prefer_fallback {
                fallback.or(native)
            } else {
                native.or(fallback)
            };
            chosen.cloned()
        });

        Self { slots }
    }

    pub fn get(&self, op: Op) -> Option<&dyn Strategy> {
        self.slots[op.index()].as_deref()
    }

    pub fn strategy_name(&self, op: Op) -> Option<&'static str> {
        self.get(op).map(|s| s.name())
    }

    /// `(operation, strategy name)` for every operation, in [`Op::ALL`] order.
    pub fn entries(&self) -> impl Iterator<Item = (Op, Option<&'static str>)> + '_ {
        Op::ALL.iter().map(move |op| (*op, self.strategy_name(*op)))
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries().map(|(op, name)| (op.name(), name)))
            .finish()
    }
}
