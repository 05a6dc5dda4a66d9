use std::sync::Arc;

use anchor_lang::prelude::{borsh, AnchorDeserialize, AnchorSerialize, Pubkey};
use tracing::{error, info, warn};

use super::ensure_held;
use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::{MigrationCompleted, SubscriptionCanceled, SubscriptionCreated};
use crate::interfaces::{Environment, MigrationRefund, MigrationTarget, TokenLedger, VrfConsumer};
use crate::state::{Subscription, MAX_CONSUMERS};
use crate::Coordinator;

/// Version of the [`MigrationData`] layout this coordinator produces and accepts.
pub const MIGRATION_VERSION: u8 = 1;

/// A subscription as packaged for a successor coordinator.
#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct MigrationData {
    pub from_version: u8,
    pub sub_owner: Pubkey,
    pub consumers: Vec<Pubkey>,
    pub link_balance: u128,
    pub native_balance: u128,
}

impl MigrationData {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(64 + 32 * self.consumers.len());
        self.serialize(&mut data)
            .map_err(|_| CoordinatorError::InvalidMigrationPayload)?;
        Ok(data)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::try_from_slice(bytes).map_err(|_| CoordinatorError::InvalidMigrationPayload)
    }
}

/// Move `sub_id` with its balances and consumers to `new_coordinator`.
///
/// The local subscription is deleted first. Before anything leaves this
/// coordinator, the target must be deployed, every consumer must have code
/// and both balances must be held. The target then accepts the package, the
/// balances follow, and every consumer is repointed. If a step after the
/// target accepted fails, the target is asked to undo the migration and
/// return what it received; the local ledger is restored either way.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, new_coordinator: Pubkey) -> Result<u64> {
    coordinator.atomic(true, || {
        let data = coordinator.stage(tx, |ctx| {
            if !ctx.state.is_migration_target(&new_coordinator) {
                return Err(CoordinatorError::CoordinatorNotRegistered(new_coordinator));
            }
            ctx.only_sub_owner(sub_id)?;
            if ctx.state.pending_request_exists(sub_id) {
                return Err(CoordinatorError::PendingRequestExists);
            }

            let sub = ctx.state.delete_subscription(sub_id)?;
            ctx.state.total_balance = ctx
                .state
                .total_balance
                .checked_sub(sub.balance)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            ctx.state.total_native_balance = ctx
                .state
                .total_native_balance
                .checked_sub(sub.native_balance)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            ctx.charge_writes(1 + sub.consumers.len() as u64)?;

            Ok(MigrationData {
                from_version: MIGRATION_VERSION,
                sub_owner: sub.owner,
                consumers: sub.consumers,
                link_balance: sub.balance,
                native_balance: sub.native_balance,
            })
        })?;

        let env = &coordinator.env;
        let from = coordinator.id();
        let target = env.contracts.migration_target(&new_coordinator).ok_or_else(|| {
            CoordinatorError::MigrationTargetFailed(format!("no coordinator deployed at {new_coordinator}"))
        })?;
        let link_token = match data.link_balance {
            0 => None,
            _ => Some(env.link_token.clone().ok_or(CoordinatorError::LinkNotSet)?),
        };
        ensure_held(env.native_token.as_ref(), &from, data.native_balance)?;
        if let Some(token) = &link_token {
            ensure_held(token.as_ref(), &from, data.link_balance)?;
        }
        let consumers = data
            .consumers
            .iter()
            .map(|consumer| {
                env.contracts
                    .consumer(consumer)
                    .map(|code| (*consumer, code))
                    .ok_or_else(|| CoordinatorError::ConsumerNotificationFailed {
                        consumer: *consumer,
                        reason: "no code deployed".to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let payload = data.encode()?;

        let mut nested = tx.nested(from);
        let accepted = target.on_migration(&mut nested, data.native_balance, &payload);
        tx.absorb(&nested)?;
        let new_sub_id = accepted.map_err(|e| CoordinatorError::MigrationTargetFailed(e.to_string()))?;

        let mut handed = MigrationRefund {
            prior_sub_id: sub_id,
            ..MigrationRefund::default()
        };
        let handover = Handover {
            env,
            from,
            to: new_coordinator,
            new_sub_id,
            data: &data,
            link_token: link_token.as_deref(),
            consumers: &consumers,
        };
        if let Err(e) = handover.run(&mut handed) {
            take_back(target.as_ref(), tx, from, new_sub_id, handed);
            return Err(e);
        }

        coordinator.stage(tx, |ctx| {
            ctx.emit(MigrationCompleted {
                new_coordinator,
                sub_id,
                new_sub_id,
            });
            Ok(())
        })?;
        info!(sub_id, new_sub_id, %new_coordinator, "Subscription migrated");
        Ok(new_sub_id)
    })
}

/// Everything that leaves the source once the target accepted.
struct Handover<'a> {
    env: &'a Environment,
    from: Pubkey,
    to: Pubkey,
    new_sub_id: u64,
    data: &'a MigrationData,
    link_token: Option<&'a dyn TokenLedger>,
    consumers: &'a [(Pubkey, Arc<dyn VrfConsumer>)],
}

impl Handover<'_> {
    /// Records each effect in `handed` as soon as it happened.
    fn run(&self, handed: &mut MigrationRefund) -> Result<()> {
        if self.data.native_balance > 0 {
            self.env
                .native_token
                .transfer(&self.from, &self.to, self.data.native_balance)
                .map_err(CoordinatorError::TransferFailed)?;
            handed.native = self.data.native_balance;
        }
        if let Some(token) = self.link_token {
            token
                .transfer(&self.from, &self.to, self.data.link_balance)
                .map_err(CoordinatorError::TransferFailed)?;
            handed.link = self.data.link_balance;
        }
        for (consumer, code) in self.consumers {
            code.set_coordinator(self.from, self.to, self.new_sub_id)
                .map_err(|e| CoordinatorError::ConsumerNotificationFailed {
                    consumer: *consumer,
                    reason: e.to_string(),
                })?;
            handed.repoint.push(*consumer);
        }
        Ok(())
    }
}

fn take_back(target: &dyn MigrationTarget, tx: &mut TxContext, from: Pubkey, new_sub_id: u64, handed: MigrationRefund) {
    let mut nested = tx.nested(from);
    let undone = target
        .abort_migration(&mut nested, new_sub_id, handed)
        .and_then(|()| tx.absorb(&nested).map_err(Into::into));
    match undone {
        Ok(()) => warn!(new_sub_id, "Migration undone on target"),
        Err(e) => error!(new_sub_id, error = %e, "Target could not undo migration"),
    }
}

/// Accept a subscription migrated from `tx.caller`, which must be one of
/// this coordinator's registered peers.
pub fn receive(coordinator: &Coordinator, tx: &mut TxContext, native_amount: u128, payload: &[u8]) -> Result<u64> {
    let data = MigrationData::decode(payload)?;
    coordinator.transact(tx, false, |ctx| {
        let from = ctx.tx.caller;
        if !ctx.state.is_migration_target(&from) {
            return Err(CoordinatorError::CoordinatorNotRegistered(from));
        }
        if data.from_version != MIGRATION_VERSION {
            return Err(CoordinatorError::InvalidMigrationVersion(data.from_version));
        }
        if native_amount != data.native_balance {
            return Err(CoordinatorError::InvalidNativeBalance {
                transferred: native_amount,
                expected: data.native_balance,
            });
        }
        if data.consumers.len() > MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers);
        }

        let sub_id = ctx
            .state
            .current_sub_id
            .checked_add(1)
            .ok_or(CoordinatorError::CounterOverflow)?;
        ctx.state.current_sub_id = sub_id;

        let mut sub = Subscription::new(data.sub_owner);
        sub.balance = data.link_balance;
        sub.native_balance = data.native_balance;
        for consumer in &data.consumers {
            if !sub.consumers.contains(consumer) {
                sub.consumers.push(*consumer);
                ctx.state.consumer_nonces.insert((*consumer, sub_id), 1);
            }
        }
        ctx.charge_writes(3 + sub.consumers.len() as u64)?;
        ctx.state.subscriptions.insert(sub_id, sub);
        ctx.state.inbound_migrations.insert(sub_id, from);

        ctx.state.total_balance = ctx
            .state
            .total_balance
            .checked_add(data.link_balance)
            .ok_or(CoordinatorError::BalanceOverflow)?;
        ctx.state.total_native_balance = ctx
            .state
            .total_native_balance
            .checked_add(data.native_balance)
            .ok_or(CoordinatorError::BalanceOverflow)?;

        ctx.emit(SubscriptionCreated {
            sub_id,
            owner: data.sub_owner,
        });
        info!(sub_id, %from, owner = %data.sub_owner, "Subscription received by migration");
        Ok(sub_id)
    })
}

/// Drop a subscription this coordinator accepted from `tx.caller` and hand
/// back what reached it. Consumers that refuse to be pointed back are
/// logged and skipped: by then the funds have already been returned.
pub fn abort(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, refund: MigrationRefund) -> Result<()> {
    let from = tx.caller;
    coordinator.atomic(false, || {
        coordinator.stage(tx, |ctx| {
            if !ctx.state.is_migration_target(&from) {
                return Err(CoordinatorError::CoordinatorNotRegistered(from));
            }
            if ctx.state.inbound_migrations.get(&sub_id) != Some(&from) {
                return Err(CoordinatorError::InvalidSubscription);
            }
            let sub = ctx.state.subscription(sub_id)?;
            if sub.req_count > 0
                || refund.link > sub.balance
                || refund.native > sub.native_balance
                || ctx.state.pending_request_exists(sub_id)
            {
                return Err(CoordinatorError::MigrationNotReversible(sub_id));
            }

            let sub = ctx.state.delete_subscription(sub_id)?;
            ctx.state.total_balance = ctx
                .state
                .total_balance
                .checked_sub(sub.balance)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            ctx.state.total_native_balance = ctx
                .state
                .total_native_balance
                .checked_sub(sub.native_balance)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            ctx.charge_writes(2 + sub.consumers.len() as u64)?;

            ctx.emit(SubscriptionCanceled {
                sub_id,
                to: from,
                amount_link: refund.link,
                amount_native: refund.native,
            });
            Ok(())
        })?;

        let env = &coordinator.env;
        let me = coordinator.id();
        let link_token = match refund.link {
            0 => None,
            _ => Some(env.link_token.clone().ok_or(CoordinatorError::LinkNotSet)?),
        };
        ensure_held(env.native_token.as_ref(), &me, refund.native)?;
        if let Some(token) = &link_token {
            ensure_held(token.as_ref(), &me, refund.link)?;
        }
        if refund.native > 0 {
            env.native_token
                .transfer(&me, &from, refund.native)
                .map_err(CoordinatorError::TransferFailed)?;
        }
        if let Some(token) = &link_token {
            token
                .transfer(&me, &from, refund.link)
                .map_err(CoordinatorError::TransferFailed)?;
        }

        for consumer in &refund.repoint {
            let repointed = match env.contracts.consumer(consumer) {
                Some(code) => code
                    .set_coordinator(me, from, refund.prior_sub_id)
                    .map_err(|e| e.to_string()),
                None => Err("no code deployed".to_string()),
            };
            if let Err(reason) = repointed {
                error!(sub_id, %consumer, %reason, "Consumer not pointed back after aborted migration");
            }
        }
        warn!(sub_id, %from, link = refund.link, native = refund.native, "Migrated subscription returned");
        Ok(())
    })
}
