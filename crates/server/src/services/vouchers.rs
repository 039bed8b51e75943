//! Voucher redemption.
//!
//! The redemption record commits before any goods are granted, so a code can
//! never be claimed twice by one user even if delivery fails. Grants are best
//! effort: each failure is logged and the remaining contents are still sent.

use gamelink_core::{UserId, VoucherCode, VoucherId};

use super::error::GameError;
use crate::gateway::GameGateway;
use crate::store::{RedemptionOutcome, UserStore, VoucherStore};

/// Result of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionReceipt {
    /// Redeemed voucher.
    pub voucher_id: VoucherId,
    /// Content lines delivered.
    pub granted: usize,
    /// Content lines that failed to deliver.
    pub failed: usize,
}

/// Voucher service.
pub struct VoucherService<'a> {
    users: &'a dyn UserStore,
    vouchers: &'a dyn VoucherStore,
    gateway: &'a dyn GameGateway,
}

impl<'a> VoucherService<'a> {
    /// Create a new voucher service.
    #[must_use]
    pub fn new(
        users: &'a dyn UserStore,
        vouchers: &'a dyn VoucherStore,
        gateway: &'a dyn GameGateway,
    ) -> Self {
        Self {
            users,
            vouchers,
            gateway,
        }
    }

    /// Redeem a voucher code for the caller.
    ///
    /// # Errors
    ///
    /// Returns `GameError::NotLinked`, `GameError::VoucherNotFound`,
    /// `GameError::AlreadyRedeemed`, `GameError::RedemptionExhausted` or
    /// `GameError::MisconfiguredVoucher`. Grant failures are not errors.
    pub async fn redeem(
        &self,
        user_id: UserId,
        code: &VoucherCode,
    ) -> Result<RedemptionReceipt, GameError> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(GameError::UserNotFound)?;
        let account = user.game.ok_or(GameError::NotLinked)?.account_id;

        let voucher = self
            .vouchers
            .find_by_code(code)
            .await?
            .ok_or(GameError::VoucherNotFound)?;

        if self.vouchers.has_redeemed(user_id, voucher.id).await? {
            return Err(GameError::AlreadyRedeemed);
        }

        if let Some(cap) = voucher.max_total_redemptions {
            let count = self.vouchers.redemption_count(voucher.id).await?;
            if count >= i64::from(cap) {
                return Err(GameError::RedemptionExhausted);
            }
        }

        if voucher.contents.is_empty() {
            return Err(GameError::MisconfiguredVoucher);
        }

        let record = match self.vouchers.record_redemption(user_id, &voucher).await? {
            RedemptionOutcome::Recorded(record) => record,
            RedemptionOutcome::AlreadyRedeemed => return Err(GameError::AlreadyRedeemed),
            RedemptionOutcome::Exhausted => return Err(GameError::RedemptionExhausted),
        };

        let mut granted = 0;
        let mut failed = 0;
        for entry in &voucher.contents {
            match self
                .gateway
                .grant_goods(account, entry.goods_id, entry.quantity)
                .await
            {
                Ok(()) => granted += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        user_id = %user_id,
                        game_account_id = %account,
                        voucher_id = %voucher.id,
                        redemption_id = %record.id,
                        goods_id = %entry.goods_id,
                        quantity = entry.quantity,
                        error = %e,
                        "voucher grant failed"
                    );
                }
            }
        }

        tracing::info!(
            user_id = %user_id,
            voucher_id = %voucher.id,
            code = %voucher.code,
            granted,
            failed,
            "voucher redeemed"
        );

        Ok(RedemptionReceipt {
            voucher_id: voucher.id,
            granted,
            failed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gamelink_core::{GameAccountId, GoodsId};

    use super::*;
    use crate::testing::{FakeGateway, MemoryStore, linked_user, test_user, voucher};

    fn code(s: &str) -> VoucherCode {
        VoucherCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_redeem_grants_all_contents() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let user = store.insert_user(linked_user("alice", 0, 5));
        store.insert_voucher(voucher("WELCOME", None, &[(10, 1), (11, 2)]));

        let receipt = VoucherService::new(&store, &store, &gateway)
            .redeem(user.id, &code("welcome"))
            .await
            .unwrap();

        assert_eq!(receipt.granted, 2);
        assert_eq!(receipt.failed, 0);
        assert_eq!(
            gateway.grants(),
            vec![
                (GameAccountId::new(5), GoodsId::new(10), 1),
                (GameAccountId::new(5), GoodsId::new(11), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_redeem_is_already_redeemed() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let user = store.insert_user(linked_user("alice", 0, 5));
        store.insert_voucher(voucher("WELCOME", None, &[(10, 1)]));
        let service = VoucherService::new(&store, &store, &gateway);

        service.redeem(user.id, &code("WELCOME")).await.unwrap();
        let err = service.redeem(user.id, &code("WELCOME")).await.unwrap_err();

        assert!(matches!(err, GameError::AlreadyRedeemed));
        assert_eq!(gateway.grants().len(), 1);
    }

    #[tokio::test]
    async fn test_cap_is_enforced_across_users() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let alice = store.insert_user(linked_user("alice", 0, 5));
        let bob = store.insert_user(linked_user("bob", 0, 6));
        store.insert_voucher(voucher("LIMITED", Some(1), &[(10, 1)]));
        let service = VoucherService::new(&store, &store, &gateway);

        service.redeem(alice.id, &code("LIMITED")).await.unwrap();
        let err = service.redeem(bob.id, &code("LIMITED")).await.unwrap_err();

        assert!(matches!(err, GameError::RedemptionExhausted));
    }

    #[tokio::test]
    async fn test_grant_failure_still_consumes_voucher() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        gateway.fail_grants_of(GoodsId::new(10));
        let user = store.insert_user(linked_user("alice", 0, 5));
        let v = store.insert_voucher(voucher("WELCOME", None, &[(10, 1), (11, 1)]));
        let service = VoucherService::new(&store, &store, &gateway);

        let receipt = service.redeem(user.id, &code("WELCOME")).await.unwrap();

        assert_eq!(receipt.granted, 1);
        assert_eq!(receipt.failed, 1);
        assert!(store.has_redeemed(user.id, v.id).await.unwrap());
        let err = service.redeem(user.id, &code("WELCOME")).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyRedeemed));
    }

    #[tokio::test]
    async fn test_rejections() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let linked = store.insert_user(linked_user("alice", 0, 5));
        let unlinked = store.insert_user(test_user("bob", 0));
        store.insert_voucher(voucher("EMPTY", None, &[]));
        let mut off = voucher("OFF", None, &[(10, 1)]);
        off.active = false;
        store.insert_voucher(off);
        let service = VoucherService::new(&store, &store, &gateway);

        let err = service.redeem(unlinked.id, &code("EMPTY")).await.unwrap_err();
        assert!(matches!(err, GameError::NotLinked));

        let err = service.redeem(linked.id, &code("MISSING")).await.unwrap_err();
        assert!(matches!(err, GameError::VoucherNotFound));

        let err = service.redeem(linked.id, &code("OFF")).await.unwrap_err();
        assert!(matches!(err, GameError::VoucherNotFound));

        let err = service.redeem(linked.id, &code("EMPTY")).await.unwrap_err();
        assert!(matches!(err, GameError::MisconfiguredVoucher));
        assert!(gateway.grants().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_redeems_by_one_user_record_once() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let user = store.insert_user(linked_user("alice", 0, 5));
        let v = store.insert_voucher(voucher("WELCOME", None, &[(10, 1)]));
        let service = VoucherService::new(&store, &store, &gateway);
        let welcome = code("WELCOME");

        let (a, b) = tokio::join!(
            service.redeem(user.id, &welcome),
            service.redeem(user.id, &welcome)
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.redemption_count(v.id).await.unwrap(), 1);
    }
}
