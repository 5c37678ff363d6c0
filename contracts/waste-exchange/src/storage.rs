//! Persistent per-record storage.
//!
//! Every record lives under its own `DataKey` and has its TTL extended
//! whenever it is read or written. Counters, the pause flag and other small
//! values stay in instance storage, which callers keep alive with
//! `extend_instance`.

use core::fmt::Debug;

use soroban_sdk::{Address, Env, IntoVal, String, TryFromVal, Val};

use crate::types::{Bid, DataKey, Listing, Notification, Order, User};

const DAY_IN_LEDGERS: u32 = 17_280;

pub(crate) const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = INSTANCE_BUMP_AMOUNT - DAY_IN_LEDGERS;

pub(crate) const RECORD_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
pub(crate) const RECORD_LIFETIME_THRESHOLD: u32 = RECORD_BUMP_AMOUNT - DAY_IN_LEDGERS;

pub(crate) fn extend_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

fn load<V>(env: &Env, key: &DataKey) -> Option<V>
where
    V: TryFromVal<Env, Val>,
    V::Error: Debug,
{
    let value: Option<V> = env.storage().persistent().get(key);
    if value.is_some() {
        env.storage()
            .persistent()
            .extend_ttl(key, RECORD_LIFETIME_THRESHOLD, RECORD_BUMP_AMOUNT);
    }
    value
}

fn save<V: IntoVal<Env, Val>>(env: &Env, key: &DataKey, value: &V) {
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, RECORD_LIFETIME_THRESHOLD, RECORD_BUMP_AMOUNT);
}

// Accounts

pub(crate) fn user(env: &Env, account: &Address) -> Option<User> {
    load(env, &DataKey::User(account.clone()))
}

pub(crate) fn has_user(env: &Env, account: &Address) -> bool {
    env.storage().persistent().has(&DataKey::User(account.clone()))
}

pub(crate) fn set_user(env: &Env, user: &User) {
    save(env, &DataKey::User(user.account.clone()), user);
}

pub(crate) fn account_for_email(env: &Env, email: &String) -> Option<Address> {
    load(env, &DataKey::Email(email.clone()))
}

pub(crate) fn set_email(env: &Env, email: &String, account: &Address) {
    save(env, &DataKey::Email(email.clone()), account);
}

pub(crate) fn account_at(env: &Env, index: u64) -> Option<Address> {
    load(env, &DataKey::AccountAt(index))
}

pub(crate) fn set_account_at(env: &Env, index: u64, account: &Address) {
    save(env, &DataKey::AccountAt(index), account);
}

// Lots and bids

pub(crate) fn listing(env: &Env, listing_id: u64) -> Option<Listing> {
    load(env, &DataKey::Listing(listing_id))
}

pub(crate) fn set_listing(env: &Env, listing: &Listing) {
    save(env, &DataKey::Listing(listing.id), listing);
}

pub(crate) fn bid(env: &Env, bid_id: u64) -> Option<Bid> {
    load(env, &DataKey::Bid(bid_id))
}

pub(crate) fn set_bid(env: &Env, bid: &Bid) {
    save(env, &DataKey::Bid(bid.id), bid);
}

pub(crate) fn listing_bid_at(env: &Env, listing_id: u64, position: u32) -> Option<u64> {
    load(env, &DataKey::ListingBid(listing_id, position))
}

pub(crate) fn set_listing_bid_at(env: &Env, listing_id: u64, position: u32, bid_id: u64) {
    save(env, &DataKey::ListingBid(listing_id, position), &bid_id);
}

// Orders

pub(crate) fn order(env: &Env, order_id: u64) -> Option<Order> {
    load(env, &DataKey::Order(order_id))
}

pub(crate) fn set_order(env: &Env, order: &Order) {
    save(env, &DataKey::Order(order.id), order);
}

// Notifications

pub(crate) fn notification(env: &Env, notification_id: u64) -> Option<Notification> {
    load(env, &DataKey::Notification(notification_id))
}

pub(crate) fn set_notification(env: &Env, notification: &Notification) {
    save(env, &DataKey::Notification(notification.id), notification);
}

pub(crate) fn inbox_len(env: &Env, recipient: &Address) -> u32 {
    load(env, &DataKey::InboxLen(recipient.clone())).unwrap_or(0)
}

pub(crate) fn inbox_at(env: &Env, recipient: &Address, position: u32) -> Option<u64> {
    load(env, &DataKey::InboxEntry(recipient.clone(), position))
}

/// Appends `notification_id` to the end of the recipient's inbox.
pub(crate) fn push_inbox(env: &Env, recipient: &Address, notification_id: u64) {
    let position = inbox_len(env, recipient);
    save(env, &DataKey::InboxEntry(recipient.clone(), position), &notification_id);
    save(env, &DataKey::InboxLen(recipient.clone()), &(position + 1));
}
