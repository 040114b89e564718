use orderpay::domain::ids::UserId;
use orderpay::domain::money::{Amount, Currency};
use orderpay::domain::order::{NewOrder, OrderStatus};
use orderpay::domain::payment::{IdempotencyKey, NewPayment, PaymentStatus};
use orderpay::domain::ports::{OrderStoreBox, PaymentStoreBox, TransactionalStoreBox};
use orderpay::infrastructure::in_memory::InMemoryStore;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let store = InMemoryStore::new();
    let order_store: OrderStoreBox = Box::new(store.clone());
    let payment_store: PaymentStoreBox = Box::new(store.clone());
    let transactions: TransactionalStoreBox = Box::new(store);

    // Verify Send + Sync by spawning tasks
    let order = tokio::spawn(async move {
        let amount = Amount::new(dec!(100.0)).unwrap();
        order_store
            .insert(NewOrder::new(UserId(1), amount, Currency::Usd))
            .await
            .unwrap()
    })
    .await
    .unwrap();

    let payment = tokio::spawn({
        let order = order.clone();
        async move {
            let key = IdempotencyKey::new("dyn").unwrap();
            payment_store
                .insert(NewPayment::for_order(&order, key))
                .await
                .unwrap()
        }
    })
    .await
    .unwrap();

    let settled = tokio::spawn(async move {
        let mut tx = transactions.begin().await.unwrap();
        let mut locked = tx.lock_payment(payment.id).await.unwrap().unwrap();
        locked.settle(PaymentStatus::Successful).unwrap();
        tx.update_payment(&locked).await.unwrap();
        let changed = tx
            .try_transition_order(order.id, OrderStatus::Created, OrderStatus::Paid)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (locked, changed)
    })
    .await
    .unwrap();

    assert_eq!(settled.0.status, PaymentStatus::Successful);
    assert_eq!(settled.1, 1);
}
