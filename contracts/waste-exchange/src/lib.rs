/*!
 * Textile Waste Exchange Contract
 *
 * Marketplace for lots of textile waste traded between suppliers and buyers,
 * moderated by an admin.
 * Key features:
 * - English auctions with floor price, optional minimum increment and buy-now
 * - KYB gate: only verified suppliers can publish lots
 * - Escrow lifecycle for orders with delivery confirmation and disputes
 * - Per-account notifications (outbid, new bid, sale, escrow release, KYB)
 * - Pausable market with admin-tunable fee, increment and auction window
 *
 * Business Logic:
 * 1. Suppliers register (KYB pending) and are verified by the admin
 * 2. Verified suppliers publish lots; unverified ones can only keep drafts
 * 3. Buyers bid until the auction ends, or buy the lot outright
 * 4. Ended auctions are closed into an order for the winner, or expire
 * 5. Buyers pay into escrow and confirm delivery to release the funds
 * 6. Disputed orders are resolved by the admin
 */

#![no_std]

mod storage;
mod types;


use soroban_sdk::{contract, contractimpl, log, symbol_short, Address, Env, Map, String, Symbol, Vec};

pub use types::{
    Bid, Classification, ColorClass, DataKey, DisputeResolution, Error, KybStatus, Listing,
    ListingDraft, ListingStatus, MarketStats, MaterialType, Notification, NotificationKind, Order,
    OrderStatus, Role, User, WasteGrade, MAX_BASIS_POINTS,
};

use types::{
    ADMIN_UPDATED, AUCTION_CLOSED, BID_PLACED, BOUGHT_NOW, DISPUTE_RAISED, DISPUTE_RESOLVED,
    KYB_UPDATED, LISTING_CREATED, LISTING_PUBLISHED, LISTING_STATUS, ORDER_DELIVERED, ORDER_PAID,
    ORDER_STATUS, USER_REGISTERED,
};

#[contract]
pub struct WasteExchangeContract;

// Persistent storage: configuration
const ADMIN_KEY: Symbol = symbol_short!("ADMIN");
const FEE_RATE_KEY: Symbol = symbol_short!("FEE_RATE"); // Platform fee in basis points
const BID_INCREMENT_KEY: Symbol = symbol_short!("BID_INCR"); // Minimum raise over the current bid, PKR
const MIN_WINDOW_KEY: Symbol = symbol_short!("MIN_WIN"); // Shortest auction, seconds
const MAX_WINDOW_KEY: Symbol = symbol_short!("MAX_WIN"); // Longest auction, seconds

// Instance storage: counters and flags. Records live under `DataKey` (see storage.rs)
const NEXT_LISTING_ID: Symbol = symbol_short!("NEXT_L_ID");
const NEXT_BID_ID: Symbol = symbol_short!("NEXT_B_ID");
const NEXT_ORDER_ID: Symbol = symbol_short!("NEXT_O_ID");
const NEXT_NOTIFICATION_ID: Symbol = symbol_short!("NEXT_N_ID");
const USER_COUNT: Symbol = symbol_short!("USER_CNT");
const PAUSED_KEY: Symbol = symbol_short!("PAUSED");

const DEFAULT_FEE_RATE: u32 = 300; // 3% platform fee on checkout
const MAX_FEE_RATE: u32 = 1_000; // 10%
const DEFAULT_BID_INCREMENT: i128 = 1; // Bids must strictly beat the current bid
const DEFAULT_MIN_AUCTION_WINDOW: u64 = 3_600; // 1 hour
const DEFAULT_MAX_AUCTION_WINDOW: u64 = 30 * 86_400; // 30 days
const MAX_REASONABLE_WINDOW: u64 = 365 * 86_400;
const BASIS_POINTS_DIVISOR: u32 = 10_000;

#[contractimpl]
impl WasteExchangeContract {
    /// Initializes the exchange and registers `admin` as its moderator.
    /// Can only be called once.
    ///
    /// # Arguments
    /// * `admin` - Address with moderation rights (KYB, force-cancel, disputes, config)
    /// * `email` - Admin's contact email, unique across accounts
    /// * `full_name` - Admin's display name
    pub fn initialize(env: Env, admin: Address, email: String, full_name: String) -> Result<(), Error> {
        if env.storage().persistent().has(&ADMIN_KEY) {
            panic!("Contract already initialized");
        }
        admin.require_auth();

        env.storage().persistent().set(&ADMIN_KEY, &admin);
        env.storage().persistent().set(&FEE_RATE_KEY, &DEFAULT_FEE_RATE);
        env.storage().persistent().set(&BID_INCREMENT_KEY, &DEFAULT_BID_INCREMENT);
        env.storage().persistent().set(&MIN_WINDOW_KEY, &DEFAULT_MIN_AUCTION_WINDOW);
        env.storage().persistent().set(&MAX_WINDOW_KEY, &DEFAULT_MAX_AUCTION_WINDOW);

        env.storage().instance().set(&NEXT_LISTING_ID, &0u64);
        env.storage().instance().set(&NEXT_BID_ID, &0u64);
        env.storage().instance().set(&NEXT_ORDER_ID, &0u64);
        env.storage().instance().set(&NEXT_NOTIFICATION_ID, &0u64);
        env.storage().instance().set(&USER_COUNT, &0u64);
        env.storage().instance().set(&PAUSED_KEY, &false);
        Self::_extend_ttl(&env);

        let empty = String::from_str(&env, "");
        Self::_store_user(&env, &admin, Role::Admin, email, full_name, empty)?;

        Ok(())
    }

    // ================================================================================================
    // INTERNAL HELPERS
    // ================================================================================================

    /// Keeps the contract instance and its configuration entries alive.
    fn _extend_ttl(env: &Env) {
        storage::extend_instance(env);
        for key in [&ADMIN_KEY, &FEE_RATE_KEY, &BID_INCREMENT_KEY, &MIN_WINDOW_KEY, &MAX_WINDOW_KEY] {
            if env.storage().persistent().has(key) {
                env.storage().persistent().extend_ttl(
                    key,
                    storage::RECORD_LIFETIME_THRESHOLD,
                    storage::RECORD_BUMP_AMOUNT,
                );
            }
        }
    }

    /// Loads the admin address and requires its signature.
    fn _require_admin(env: &Env) -> Result<Address, Error> {
        let admin: Address = env.storage().persistent().get(&ADMIN_KEY).ok_or(Error::NotInitialized)?;
        admin.require_auth();
        Self::_extend_ttl(env);
        Ok(admin)
    }

    fn _is_admin(env: &Env, account: &Address) -> bool {
        let admin: Option<Address> = env.storage().persistent().get(&ADMIN_KEY);
        admin.map_or(false, |admin| admin == *account)
    }

    fn _is_paused(env: &Env) -> bool {
        env.storage().instance().get(&PAUSED_KEY).unwrap_or(false)
    }

    fn _require_not_paused(env: &Env) -> Result<(), Error> {
        if Self::_is_paused(env) {
            return Err(Error::ContractPaused);
        }
        Ok(())
    }

    /// Looks up a registered account and checks it holds `role`.
    fn _require_role(env: &Env, account: &Address, role: Role) -> Result<User, Error> {
        let user = storage::user(env, account).ok_or(Error::UserNotFound)?;
        if user.role != role {
            return Err(match role {
                Role::Supplier => Error::NotSupplier,
                Role::Buyer => Error::NotBuyer,
                Role::Admin => Error::Unauthorized,
            });
        }
        Ok(user)
    }

    fn _counter(env: &Env, key: &Symbol) -> u64 {
        env.storage().instance().get(key).unwrap_or(0)
    }

    /// Returns the counter stored under `key` and advances it.
    fn _next_id(env: &Env, key: &Symbol) -> u64 {
        let id = Self::_counter(env, key);
        env.storage().instance().set(key, &(id + 1));
        id
    }

    /// Writes a new account record. Suppliers start with KYB pending.
    fn _store_user(
        env: &Env,
        account: &Address,
        role: Role,
        email: String,
        full_name: String,
        company_name: String,
    ) -> Result<User, Error> {
        if email.len() == 0 || full_name.len() == 0 {
            return Err(Error::InvalidProfile);
        }
        if storage::has_user(env, account) {
            return Err(Error::UserAlreadyExists);
        }
        if storage::account_for_email(env, &email).is_some() {
            return Err(Error::EmailTaken);
        }

        let kyb_status = match role {
            Role::Supplier => KybStatus::Pending,
            _ => KybStatus::NotRequired,
        };
        let user = User {
            account: account.clone(),
            email: email.clone(),
            role,
            full_name,
            company_name,
            kyb_status,
            created_at: env.ledger().timestamp(),
        };

        storage::set_user(env, &user);
        storage::set_email(env, &email, account);
        let index = Self::_next_id(env, &USER_COUNT);
        storage::set_account_at(env, index, account);

        env.events().publish((USER_REGISTERED, account.clone()), (role,));
        Ok(user)
    }

    fn _message_for(env: &Env, kind: NotificationKind) -> String {
        let text = match kind {
            NotificationKind::Outbid => "You have been outbid",
            NotificationKind::NewBid => "New bid received on your listing",
            NotificationKind::ItemSold => "Your listing has been sold",
            NotificationKind::AuctionWon => "You won the auction",
            NotificationKind::AuctionExpired => "Your auction ended without bids",
            NotificationKind::ListingCancelled => "Your listing was cancelled by an admin",
            NotificationKind::OrderPaid => "Payment received into escrow",
            NotificationKind::DeliveryConfirmed => "Delivery confirmed, escrow funds released",
            NotificationKind::OrderDisputed => "An order has been disputed",
            NotificationKind::OrderStatusChanged => "Order status updated by admin",
            NotificationKind::DisputeResolved => "Dispute resolved by admin",
            NotificationKind::KybVerified => "Your business has been verified",
            NotificationKind::KybRejected => "Your business verification was rejected",
        };
        String::from_str(env, text)
    }

    /// Stores a notification and appends it to the recipient's inbox.
    fn _notify(env: &Env, recipient: &Address, kind: NotificationKind, subject_id: u64, amount_pkr: i128) -> u64 {
        let notification = Notification {
            id: Self::_next_id(env, &NEXT_NOTIFICATION_ID),
            recipient: recipient.clone(),
            kind,
            message: Self::_message_for(env, kind),
            subject_id,
            amount_pkr,
            read: false,
            created_at: env.ledger().timestamp(),
        };
        storage::set_notification(env, &notification);
        storage::push_inbox(env, recipient, notification.id);
        notification.id
    }

    /// Platform fee for `amount` at `fee_rate` basis points.
    fn _calculate_fee(amount: i128, fee_rate: u32) -> i128 {
        // Divide first for amounts where the multiplication could overflow
        const MAX_SAFE_AMOUNT: i128 = i128::MAX / (MAX_FEE_RATE as i128);
        if amount > MAX_SAFE_AMOUNT {
            (amount / BASIS_POINTS_DIVISOR as i128).saturating_mul(fee_rate as i128)
        } else {
            amount.saturating_mul(fee_rate as i128) / BASIS_POINTS_DIVISOR as i128
        }
    }

    fn _validate_auction_end(env: &Env, auction_end_at: u64) -> Result<(), Error> {
        let now = env.ledger().timestamp();
        let min_window: u64 = env.storage().persistent().get(&MIN_WINDOW_KEY).unwrap_or(DEFAULT_MIN_AUCTION_WINDOW);
        let max_window: u64 = env.storage().persistent().get(&MAX_WINDOW_KEY).unwrap_or(DEFAULT_MAX_AUCTION_WINDOW);

        if auction_end_at < now.saturating_add(min_window) || auction_end_at > now.saturating_add(max_window) {
            log!(env, "Auction end {} outside window [{}, {}] from {}", auction_end_at, min_window, max_window, now);
            return Err(Error::InvalidAuctionWindow);
        }
        Ok(())
    }

    fn _validate_draft(draft: &ListingDraft) -> Result<(), Error> {
        if draft.weight_kg == 0 || draft.min_order_kg == 0 || draft.min_order_kg > draft.weight_kg {
            return Err(Error::InvalidWeight);
        }
        if draft.floor_price_pkr <= 0 {
            return Err(Error::InvalidAmount);
        }
        if let Some(buy_now) = draft.buy_now_price_pkr {
            if buy_now <= draft.floor_price_pkr {
                return Err(Error::InvalidAmount);
            }
        }

        let c = &draft.classification;
        let scores = [c.material_confidence, c.color_confidence, c.grade_confidence, c.recyclability_score];
        if scores.iter().any(|score| *score > MAX_BASIS_POINTS) {
            return Err(Error::InvalidClassification);
        }
        let mut blend_total: u32 = 0;
        for share in c.fiber_blend.values().iter() {
            blend_total = blend_total.saturating_add(share);
        }
        if blend_total > MAX_BASIS_POINTS {
            return Err(Error::InvalidClassification);
        }
        Ok(())
    }

    /// Creates an order for `buyer` on `listing` and returns its id.
    fn _create_order(env: &Env, listing: &Listing, buyer: &Address, final_price_pkr: i128, status: OrderStatus) -> u64 {
        let fee_rate: u32 = env.storage().persistent().get(&FEE_RATE_KEY).unwrap_or(DEFAULT_FEE_RATE);
        let now = env.ledger().timestamp();
        let order = Order {
            id: Self::_next_id(env, &NEXT_ORDER_ID),
            listing_id: listing.id,
            supplier: listing.supplier.clone(),
            buyer: buyer.clone(),
            final_price_pkr,
            platform_fee_pkr: Self::_calculate_fee(final_price_pkr, fee_rate),
            status,
            created_at: now,
            updated_at: now,
        };
        storage::set_order(env, &order);
        order.id
    }

    /// Draft → Active for the owning, verified supplier.
    fn _publish(env: &Env, supplier: &Address, mut listing: Listing) -> Result<(), Error> {
        if listing.supplier != *supplier {
            return Err(Error::Unauthorized);
        }
        if listing.status != ListingStatus::Draft {
            return Err(Error::InvalidListingStatus);
        }
        let user = Self::_require_role(env, supplier, Role::Supplier)?;
        if user.kyb_status != KybStatus::Verified {
            return Err(Error::KybNotVerified);
        }
        Self::_validate_auction_end(env, listing.auction_end_at)?;

        listing.status = ListingStatus::Active;
        storage::set_listing(env, &listing);

        env.events().publish((LISTING_PUBLISHED, supplier.clone()), (listing.id,));
        Ok(())
    }

    /// Cancels a Draft or Active lot. Owners may only cancel lots without bids;
    /// the admin may cancel any open lot.
    fn _cancel(env: &Env, caller: &Address, mut listing: Listing) -> Result<(), Error> {
        if listing.status.is_terminal() {
            return Err(Error::InvalidListingStatus);
        }

        let by_admin = Self::_is_admin(env, caller);
        if !by_admin {
            if listing.supplier != *caller {
                return Err(Error::Unauthorized);
            }
            if listing.bids_count > 0 {
                log!(env, "Listing {} has {} bids, supplier cannot cancel", listing.id, listing.bids_count);
                return Err(Error::ListingHasBids);
            }
        }

        listing.status = ListingStatus::Cancelled;
        storage::set_listing(env, &listing);

        if by_admin {
            Self::_notify(env, &listing.supplier, NotificationKind::ListingCancelled, listing.id, 0);
        }
        env.events().publish((LISTING_STATUS, caller.clone()), (listing.id, ListingStatus::Cancelled));
        Ok(())
    }

    /// Active → Expired for an ended auction that drew no bids.
    fn _expire(env: &Env, mut listing: Listing) -> Result<(), Error> {
        if listing.status != ListingStatus::Active {
            return Err(Error::InvalidListingStatus);
        }
        if env.ledger().timestamp() < listing.auction_end_at {
            return Err(Error::AuctionNotEnded);
        }
        if listing.bids_count > 0 {
            return Err(Error::ListingHasBids);
        }

        listing.status = ListingStatus::Expired;
        storage::set_listing(env, &listing);

        Self::_notify(env, &listing.supplier, NotificationKind::AuctionExpired, listing.id, 0);
        env.events().publish((AUCTION_CLOSED, env.current_contract_address()), (listing.id, ListingStatus::Expired));
        Ok(())
    }

    /// Moves an order along an allowed edge and stamps `updated_at`.
    fn _transition_order(env: &Env, order: &mut Order, next: OrderStatus) -> Result<(), Error> {
        if !order.status.can_transition_to(&next) {
            log!(env, "Order {} cannot move from {:?} to {:?}", order.id, order.status, next);
            return Err(Error::InvalidOrderStatus);
        }
        order.status = next;
        order.updated_at = env.ledger().timestamp();
        storage::set_order(env, order);
        Ok(())
    }

    // ================================================================================================
    // ACCOUNTS
    // ================================================================================================

    /// Registers the signing account as a supplier or buyer.
    ///
    /// Suppliers start with KYB pending and can only keep drafts until the
    /// admin verifies them. The admin role cannot be self-assigned.
    ///
    /// # Errors
    /// - ContractPaused
    /// - Unauthorized: `role` is Admin
    /// - InvalidProfile: empty email or name
    /// - UserAlreadyExists / EmailTaken
    pub fn register_user(
        env: Env,
        account: Address,
        role: Role,
        email: String,
        full_name: String,
        company_name: String,
    ) -> Result<User, Error> {
        Self::_require_not_paused(&env)?;
        account.require_auth();
        Self::_extend_ttl(&env);

        if role == Role::Admin {
            return Err(Error::Unauthorized);
        }
        Self::_store_user(&env, &account, role, email, full_name, company_name)
    }

    /// Login lookup: resolves an email to its account.
    pub fn find_user_by_email(env: Env, email: String) -> Result<User, Error> {
        let account = storage::account_for_email(&env, &email).ok_or(Error::UserNotFound)?;
        storage::user(&env, &account).ok_or(Error::UserNotFound)
    }

    // ================================================================================================
    // KYB VERIFICATION
    // ================================================================================================

    /// Records the admin's KYB decision for a supplier and notifies them.
    ///
    /// # Errors
    /// - InvalidKybStatus: `status` is neither Verified nor Rejected
    /// - UserNotFound
    /// - NotSupplier: only suppliers go through KYB
    pub fn update_kyb_status(env: Env, user: Address, status: KybStatus) -> Result<(), Error> {
        Self::_require_admin(&env)?;

        let kind = match status {
            KybStatus::Verified => NotificationKind::KybVerified,
            KybStatus::Rejected => NotificationKind::KybRejected,
            KybStatus::Pending | KybStatus::NotRequired => return Err(Error::InvalidKybStatus),
        };

        let mut record = storage::user(&env, &user).ok_or(Error::UserNotFound)?;
        if record.role != Role::Supplier {
            return Err(Error::NotSupplier);
        }

        record.kyb_status = status;
        storage::set_user(&env, &record);

        Self::_notify(&env, &user, kind, 0, 0);
        env.events().publish((KYB_UPDATED, user), (status,));
        Ok(())
    }

    // ================================================================================================
    // LISTING LIFECYCLE
    // ================================================================================================

    /// Creates a lot owned by `supplier`.
    ///
    /// With `publish` the lot goes straight to Active, which requires a
    /// verified supplier and an auction end inside the configured window.
    /// Without it the lot is kept as a Draft.
    ///
    /// # Errors
    /// - ContractPaused
    /// - UserNotFound / NotSupplier
    /// - KybNotVerified: publishing while KYB is pending or rejected
    /// - InvalidWeight / InvalidAmount / InvalidClassification / InvalidAuctionWindow
    pub fn create_listing(env: Env, supplier: Address, draft: ListingDraft, publish: bool) -> Result<u64, Error> {
        Self::_require_not_paused(&env)?;
        supplier.require_auth();
        Self::_extend_ttl(&env);

        let user = Self::_require_role(&env, &supplier, Role::Supplier)?;
        if publish && user.kyb_status != KybStatus::Verified {
            log!(&env, "Supplier KYB is {:?}, listing must stay a draft", user.kyb_status);
            return Err(Error::KybNotVerified);
        }

        Self::_validate_draft(&draft)?;
        if publish {
            Self::_validate_auction_end(&env, draft.auction_end_at)?;
        }

        let status = if publish { ListingStatus::Active } else { ListingStatus::Draft };
        let listing = Listing {
            id: Self::_next_id(&env, &NEXT_LISTING_ID),
            supplier: supplier.clone(),
            supplier_name: user.company_name,
            supplier_location: draft.location,
            material_type: draft.material_type,
            color_class: draft.color_class,
            grade: draft.grade,
            weight_kg: draft.weight_kg,
            min_order_kg: draft.min_order_kg,
            floor_price_pkr: draft.floor_price_pkr,
            buy_now_price_pkr: draft.buy_now_price_pkr,
            status,
            auction_end_at: draft.auction_end_at,
            images: draft.images,
            classification: draft.classification,
            current_bid_pkr: None,
            highest_bid_id: None,
            bids_count: 0,
            created_at: env.ledger().timestamp(),
        };
        storage::set_listing(&env, &listing);

        env.events().publish(
            (LISTING_CREATED, supplier),
            (listing.id, listing.floor_price_pkr, status),
        );
        Ok(listing.id)
    }

    /// Publishes a draft (Draft → Active).
    pub fn publish_listing(env: Env, supplier: Address, listing_id: u64) -> Result<(), Error> {
        Self::_require_not_paused(&env)?;
        supplier.require_auth();
        Self::_extend_ttl(&env);

        let listing = storage::listing(&env, listing_id).ok_or(Error::ListingNotFound)?;
        Self::_publish(&env, &supplier, listing)
    }

    /// Requests a status change on a lot, checked against its lifecycle.
    ///
    /// - Active: owner publishes a draft (see `publish_listing`)
    /// - Cancelled: owner while no bids exist, or the admin at any time
    /// - Expired: anyone, once an auction without bids has ended
    /// - Draft and Sold cannot be requested
    ///
    /// While paused only the admin can change listing status.
    pub fn update_listing_status(env: Env, caller: Address, listing_id: u64, status: ListingStatus) -> Result<(), Error> {
        caller.require_auth();
        if !Self::_is_admin(&env, &caller) {
            Self::_require_not_paused(&env)?;
        }
        Self::_extend_ttl(&env);

        let listing = storage::listing(&env, listing_id).ok_or(Error::ListingNotFound)?;
        if listing.status.is_terminal() {
            return Err(Error::InvalidListingStatus);
        }

        match status {
            ListingStatus::Active => Self::_publish(&env, &caller, listing),
            ListingStatus::Cancelled => Self::_cancel(&env, &caller, listing),
            ListingStatus::Expired => Self::_expire(&env, listing),
            ListingStatus::Draft | ListingStatus::Sold => Err(Error::InvalidListingStatus),
        }
    }

    /// Cancels a lot; same rules as `update_listing_status(.., Cancelled)`.
    pub fn cancel_listing(env: Env, caller: Address, listing_id: u64) -> Result<(), Error> {
        Self::update_listing_status(env, caller, listing_id, ListingStatus::Cancelled)
    }

    // ================================================================================================
    // AUCTION ENGINE
    // ================================================================================================

    /// Places a bid on an active lot and returns the bid id.
    ///
    /// Every bid must meet the floor price. While the bid increment is
    /// positive, a bid must also beat the current bid by at least that much;
    /// an increment of zero turns the rule off and any bid at or above the
    /// floor becomes the current bid. The previous current bidder is
    /// notified when someone else takes over, and the supplier is notified
    /// of every bid.
    ///
    /// # Errors
    /// - ContractPaused
    /// - UserNotFound / NotBuyer
    /// - ListingNotFound / InvalidListingStatus
    /// - AuctionEnded
    /// - BidTooLow
    pub fn place_bid(env: Env, buyer: Address, listing_id: u64, amount: i128) -> Result<u64, Error> {
        Self::_require_not_paused(&env)?;
        buyer.require_auth();
        Self::_extend_ttl(&env);
        Self::_require_role(&env, &buyer, Role::Buyer)?;

        let mut listing = storage::listing(&env, listing_id).ok_or(Error::ListingNotFound)?;
        if listing.status != ListingStatus::Active {
            return Err(Error::InvalidListingStatus);
        }
        let now = env.ledger().timestamp();
        if now >= listing.auction_end_at {
            return Err(Error::AuctionEnded);
        }

        if amount < listing.floor_price_pkr {
            log!(&env, "Bid {} below floor {}", amount, listing.floor_price_pkr);
            return Err(Error::BidTooLow);
        }
        if let Some(current) = listing.current_bid_pkr {
            let increment: i128 = env.storage().persistent().get(&BID_INCREMENT_KEY).unwrap_or(DEFAULT_BID_INCREMENT);
            if increment > 0 && amount < current.saturating_add(increment) {
                log!(&env, "Bid {} does not beat current {} by {}", amount, current, increment);
                return Err(Error::BidTooLow);
            }
        }

        let previous_bidder = listing
            .highest_bid_id
            .and_then(|id| storage::bid(&env, id))
            .map(|bid| bid.buyer);

        let bid = Bid {
            id: Self::_next_id(&env, &NEXT_BID_ID),
            listing_id,
            buyer: buyer.clone(),
            amount_pkr: amount,
            created_at: now,
        };
        storage::set_bid(&env, &bid);
        storage::set_listing_bid_at(&env, listing_id, listing.bids_count, bid.id);

        listing.current_bid_pkr = Some(amount);
        listing.highest_bid_id = Some(bid.id);
        listing.bids_count += 1;
        storage::set_listing(&env, &listing);

        if let Some(previous) = previous_bidder {
            if previous != buyer {
                Self::_notify(&env, &previous, NotificationKind::Outbid, listing_id, amount);
            }
        }
        Self::_notify(&env, &listing.supplier, NotificationKind::NewBid, listing_id, amount);

        env.events().publish((BID_PLACED, buyer), (listing_id, bid.id, amount));
        Ok(bid.id)
    }

    /// Buys a lot at its buy-now price, short-circuiting the auction.
    ///
    /// Creates a Paid order and marks the lot Sold. Earlier bids stay in the
    /// history untouched. Buy-now closes once the current bid reaches the
    /// buy-now price, so the lot cannot be taken from under its highest bidder.
    ///
    /// # Errors
    /// - ContractPaused
    /// - UserNotFound / NotBuyer
    /// - ListingNotFound / InvalidListingStatus / AuctionEnded
    /// - NoBuyNowPrice: the lot is auction-only
    /// - BuyNowClosed
    pub fn buy_now(env: Env, buyer: Address, listing_id: u64) -> Result<u64, Error> {
        Self::_require_not_paused(&env)?;
        buyer.require_auth();
        Self::_extend_ttl(&env);
        Self::_require_role(&env, &buyer, Role::Buyer)?;

        let mut listing = storage::listing(&env, listing_id).ok_or(Error::ListingNotFound)?;
        let price = listing.buy_now_price_pkr.ok_or(Error::NoBuyNowPrice)?;
        if listing.status != ListingStatus::Active {
            return Err(Error::InvalidListingStatus);
        }
        if env.ledger().timestamp() >= listing.auction_end_at {
            return Err(Error::AuctionEnded);
        }
        if let Some(current) = listing.current_bid_pkr {
            if current >= price {
                log!(&env, "Current bid {} reached buy-now price {}", current, price);
                return Err(Error::BuyNowClosed);
            }
        }

        let order_id = Self::_create_order(&env, &listing, &buyer, price, OrderStatus::Paid);
        listing.status = ListingStatus::Sold;
        storage::set_listing(&env, &listing);

        Self::_notify(&env, &listing.supplier, NotificationKind::ItemSold, listing_id, price);

        env.events().publish((BOUGHT_NOW, buyer), (listing_id, order_id, price));
        Ok(order_id)
    }

    /// Settles an ended auction. Anyone can call it.
    ///
    /// With a winning bid the lot is Sold and a Pending order is opened for
    /// the winner, whose id is returned. Without bids the lot Expires and
    /// `None` is returned.
    ///
    /// # Errors
    /// - ContractPaused
    /// - ListingNotFound / InvalidListingStatus
    /// - AuctionNotEnded
    pub fn close_auction(env: Env, listing_id: u64) -> Result<Option<u64>, Error> {
        Self::_require_not_paused(&env)?;
        Self::_extend_ttl(&env);

        let mut listing = storage::listing(&env, listing_id).ok_or(Error::ListingNotFound)?;
        if listing.status != ListingStatus::Active {
            return Err(Error::InvalidListingStatus);
        }
        if env.ledger().timestamp() < listing.auction_end_at {
            return Err(Error::AuctionNotEnded);
        }

        let winning_bid = listing.highest_bid_id.and_then(|id| storage::bid(&env, id));
        let Some(bid) = winning_bid else {
            Self::_expire(&env, listing)?;
            return Ok(None);
        };

        let order_id = Self::_create_order(&env, &listing, &bid.buyer, bid.amount_pkr, OrderStatus::Pending);
        listing.status = ListingStatus::Sold;
        storage::set_listing(&env, &listing);

        Self::_notify(&env, &bid.buyer, NotificationKind::AuctionWon, order_id, bid.amount_pkr);
        Self::_notify(&env, &listing.supplier, NotificationKind::ItemSold, listing_id, bid.amount_pkr);

        env.events().publish((AUCTION_CLOSED, env.current_contract_address()), (listing_id, ListingStatus::Sold));
        Ok(Some(order_id))
    }

    // ================================================================================================
    // ORDERS & ESCROW
    // ================================================================================================

    /// Buyer pays a won auction into escrow (Pending → Paid).
    pub fn pay_order(env: Env, buyer: Address, order_id: u64) -> Result<(), Error> {
        Self::_require_not_paused(&env)?;
        buyer.require_auth();
        Self::_extend_ttl(&env);

        let mut order = storage::order(&env, order_id).ok_or(Error::OrderNotFound)?;
        if order.buyer != buyer {
            return Err(Error::Unauthorized);
        }
        if order.status != OrderStatus::Pending {
            return Err(Error::InvalidOrderStatus);
        }
        Self::_transition_order(&env, &mut order, OrderStatus::Paid)?;

        Self::_notify(&env, &order.supplier, NotificationKind::OrderPaid, order_id, order.final_price_pkr);
        env.events().publish((ORDER_PAID, buyer), (order_id,));
        Ok(())
    }

    /// Buyer confirms delivery of a paid order, releasing escrow to the supplier.
    ///
    /// # Errors
    /// - ContractPaused
    /// - OrderNotFound
    /// - Unauthorized: caller is not the order's buyer
    /// - InvalidOrderStatus: the order is not Paid
    pub fn confirm_delivery(env: Env, buyer: Address, order_id: u64) -> Result<(), Error> {
        Self::_require_not_paused(&env)?;
        buyer.require_auth();
        Self::_extend_ttl(&env);

        let mut order = storage::order(&env, order_id).ok_or(Error::OrderNotFound)?;
        if order.buyer != buyer {
            return Err(Error::Unauthorized);
        }
        if order.status != OrderStatus::Paid {
            return Err(Error::InvalidOrderStatus);
        }
        Self::_transition_order(&env, &mut order, OrderStatus::Delivered)?;

        Self::_notify(&env, &order.supplier, NotificationKind::DeliveryConfirmed, order_id, order.final_price_pkr);
        env.events().publish((ORDER_DELIVERED, buyer), (order_id,));
        Ok(())
    }

    /// Admin moves an order along its escrow lifecycle, e.g. Paid → Disputed
    /// or Disputed → Delivered. Both parties are notified.
    pub fn update_order_status(env: Env, order_id: u64, status: OrderStatus) -> Result<(), Error> {
        let admin = Self::_require_admin(&env)?;

        let mut order = storage::order(&env, order_id).ok_or(Error::OrderNotFound)?;
        Self::_transition_order(&env, &mut order, status)?;

        Self::_notify(&env, &order.buyer, NotificationKind::OrderStatusChanged, order_id, order.final_price_pkr);
        Self::_notify(&env, &order.supplier, NotificationKind::OrderStatusChanged, order_id, order.final_price_pkr);
        env.events().publish((ORDER_STATUS, admin), (order_id, status));
        Ok(())
    }

    /// Buyer or supplier disputes a paid order, freezing escrow until the
    /// admin resolves it. The other party is notified.
    pub fn raise_dispute(env: Env, caller: Address, order_id: u64) -> Result<(), Error> {
        Self::_require_not_paused(&env)?;
        caller.require_auth();
        Self::_extend_ttl(&env);

        let mut order = storage::order(&env, order_id).ok_or(Error::OrderNotFound)?;
        let counterparty = if caller == order.buyer {
            order.supplier.clone()
        } else if caller == order.supplier {
            order.buyer.clone()
        } else {
            return Err(Error::Unauthorized);
        };
        if order.status != OrderStatus::Paid {
            return Err(Error::InvalidOrderStatus);
        }
        Self::_transition_order(&env, &mut order, OrderStatus::Disputed)?;

        Self::_notify(&env, &counterparty, NotificationKind::OrderDisputed, order_id, order.final_price_pkr);
        env.events().publish((DISPUTE_RAISED, caller), (order_id,));
        Ok(())
    }

    /// Admin settles a disputed order.
    ///
    /// `ReleaseToSupplier` marks it Delivered; `RefundToBuyer` marks it Refunded.
    pub fn resolve_dispute(env: Env, order_id: u64, resolution: DisputeResolution) -> Result<(), Error> {
        Self::_require_admin(&env)?;

        let mut order = storage::order(&env, order_id).ok_or(Error::OrderNotFound)?;
        if order.status != OrderStatus::Disputed {
            return Err(Error::InvalidOrderStatus);
        }
        let next = match resolution {
            DisputeResolution::ReleaseToSupplier => OrderStatus::Delivered,
            DisputeResolution::RefundToBuyer => OrderStatus::Refunded,
        };
        Self::_transition_order(&env, &mut order, next)?;

        Self::_notify(&env, &order.buyer, NotificationKind::DisputeResolved, order_id, order.final_price_pkr);
        Self::_notify(&env, &order.supplier, NotificationKind::DisputeResolved, order_id, order.final_price_pkr);
        env.events().publish((DISPUTE_RESOLVED, env.current_contract_address()), (order_id, resolution));
        Ok(())
    }

    // ================================================================================================
    // NOTIFICATIONS
    // ================================================================================================

    /// Notifications addressed to `user`, newest first.
    pub fn get_notifications(env: Env, user: Address) -> Vec<Notification> {
        let mut result = Vec::new(&env);
        for position in (0..storage::inbox_len(&env, &user)).rev() {
            if let Some(notification) = storage::inbox_at(&env, &user, position)
                .and_then(|id| storage::notification(&env, id))
            {
                result.push_back(notification);
            }
        }
        result
    }

    pub fn get_unread_count(env: Env, user: Address) -> u32 {
        Self::get_notifications(env, user).iter().filter(|n| !n.read).count() as u32
    }

    pub fn mark_notification_read(env: Env, user: Address, notification_id: u64) -> Result<(), Error> {
        user.require_auth();
        Self::_extend_ttl(&env);

        let mut notification = storage::notification(&env, notification_id).ok_or(Error::NotificationNotFound)?;
        if notification.recipient != user {
            return Err(Error::Unauthorized);
        }
        notification.read = true;
        storage::set_notification(&env, &notification);
        Ok(())
    }

    // ================================================================================================
    // ADMINISTRATIVE FUNCTIONS
    // ================================================================================================

    /// Halts market activity. Admin moderation keeps working while paused.
    pub fn pause(env: Env) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        env.storage().instance().set(&PAUSED_KEY, &true);
        Ok(())
    }

    pub fn unpause(env: Env) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        env.storage().instance().set(&PAUSED_KEY, &false);
        Ok(())
    }

    /// Hands moderation over to `new_admin`, who must also sign.
    ///
    /// An unregistered `new_admin` is registered as an Admin account with the
    /// given email and name; an existing non-admin account is rejected.
    pub fn update_admin(env: Env, new_admin: Address, email: String, full_name: String) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        new_admin.require_auth();

        match storage::user(&env, &new_admin) {
            Some(user) if user.role != Role::Admin => return Err(Error::Unauthorized),
            Some(_) => {}
            None => {
                let empty = String::from_str(&env, "");
                Self::_store_user(&env, &new_admin, Role::Admin, email, full_name, empty)?;
            }
        }

        env.storage().persistent().set(&ADMIN_KEY, &new_admin);
        env.events().publish((ADMIN_UPDATED, env.current_contract_address()), &new_admin);
        Ok(())
    }

    /// Sets the platform fee in basis points (max 1000 = 10%).
    /// Applies to orders created afterwards.
    pub fn update_fee_rate(env: Env, new_fee_rate: u32) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        if new_fee_rate > MAX_FEE_RATE {
            return Err(Error::InvalidAmount);
        }
        env.storage().persistent().set(&FEE_RATE_KEY, &new_fee_rate);
        Ok(())
    }

    /// Sets how much a bid must beat the current bid by. Zero disables the
    /// rule: any bid at or above the floor price is accepted.
    pub fn update_bid_increment(env: Env, increment: i128) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        if increment < 0 {
            return Err(Error::InvalidAmount);
        }
        env.storage().persistent().set(&BID_INCREMENT_KEY, &increment);
        Ok(())
    }

    /// Sets the allowed auction length, in seconds from publication.
    pub fn update_auction_window(env: Env, min_seconds: u64, max_seconds: u64) -> Result<(), Error> {
        Self::_require_admin(&env)?;
        if min_seconds == 0 || min_seconds > max_seconds || max_seconds > MAX_REASONABLE_WINDOW {
            return Err(Error::InvalidAuctionWindow);
        }
        env.storage().persistent().set(&MIN_WINDOW_KEY, &min_seconds);
        env.storage().persistent().set(&MAX_WINDOW_KEY, &max_seconds);
        Ok(())
    }

    // ================================================================================================
    // QUERY FUNCTIONS (GETTERS)
    // ================================================================================================

    pub fn get_admin(env: Env) -> Result<Address, Error> {
        env.storage().persistent().get(&ADMIN_KEY).ok_or(Error::NotInitialized)
    }

    pub fn get_fee_rate(env: Env) -> u32 {
        env.storage().persistent().get(&FEE_RATE_KEY).unwrap_or(DEFAULT_FEE_RATE)
    }

    pub fn get_bid_increment(env: Env) -> i128 {
        env.storage().persistent().get(&BID_INCREMENT_KEY).unwrap_or(DEFAULT_BID_INCREMENT)
    }

    /// Returns (min_seconds, max_seconds).
    pub fn get_auction_window(env: Env) -> (u64, u64) {
        let min = env.storage().persistent().get(&MIN_WINDOW_KEY).unwrap_or(DEFAULT_MIN_AUCTION_WINDOW);
        let max = env.storage().persistent().get(&MAX_WINDOW_KEY).unwrap_or(DEFAULT_MAX_AUCTION_WINDOW);
        (min, max)
    }

    pub fn is_paused(env: Env) -> bool {
        Self::_is_paused(&env)
    }

    pub fn get_user(env: Env, account: Address) -> Option<User> {
        storage::user(&env, &account)
    }

    /// Every registered account, keyed by address.
    pub fn get_users(env: Env) -> Map<Address, User> {
        let mut users = Map::new(&env);
        for index in 0..Self::_counter(&env, &USER_COUNT) {
            if let Some(user) = storage::account_at(&env, index).and_then(|account| storage::user(&env, &account)) {
                users.set(user.account.clone(), user);
            }
        }
        users
    }

    pub fn get_listing(env: Env, listing_id: u64) -> Option<Listing> {
        storage::listing(&env, listing_id)
    }

    /// All lots in every status, keyed by id.
    pub fn get_listings(env: Env) -> Map<u64, Listing> {
        let mut listings = Map::new(&env);
        for listing_id in 0..Self::_counter(&env, &NEXT_LISTING_ID) {
            if let Some(listing) = storage::listing(&env, listing_id) {
                listings.set(listing_id, listing);
            }
        }
        listings
    }

    pub fn get_active_listings(env: Env) -> Vec<Listing> {
        let mut active = Vec::new(&env);
        for listing in Self::get_listings(env.clone()).values() {
            if listing.status == ListingStatus::Active {
                active.push_back(listing);
            }
        }
        active
    }

    /// Active lots of one material, for the marketplace material filter.
    pub fn get_active_listings_by_material(env: Env, material_type: MaterialType) -> Vec<Listing> {
        let mut active = Vec::new(&env);
        for listing in Self::get_listings(env.clone()).values() {
            if listing.status == ListingStatus::Active && listing.material_type == material_type {
                active.push_back(listing);
            }
        }
        active
    }

    /// A supplier's own lots in every status, oldest first.
    pub fn get_supplier_listings(env: Env, supplier: Address) -> Vec<Listing> {
        let mut owned = Vec::new(&env);
        for listing in Self::get_listings(env.clone()).values() {
            if listing.supplier == supplier {
                owned.push_back(listing);
            }
        }
        owned
    }

    /// Bid history of a lot, newest first.
    pub fn get_listing_bids(env: Env, listing_id: u64) -> Vec<Bid> {
        let mut history = Vec::new(&env);
        let Some(listing) = storage::listing(&env, listing_id) else {
            return history;
        };
        for position in (0..listing.bids_count).rev() {
            if let Some(bid) = storage::listing_bid_at(&env, listing_id, position).and_then(|id| storage::bid(&env, id)) {
                history.push_back(bid);
            }
        }
        history
    }

    pub fn get_highest_bid(env: Env, listing_id: u64) -> Option<Bid> {
        let listing = storage::listing(&env, listing_id)?;
        storage::bid(&env, listing.highest_bid_id?)
    }

    pub fn get_order(env: Env, order_id: u64) -> Option<Order> {
        storage::order(&env, order_id)
    }

    pub fn get_orders(env: Env) -> Map<u64, Order> {
        let mut orders = Map::new(&env);
        for order_id in 0..Self::_counter(&env, &NEXT_ORDER_ID) {
            if let Some(order) = storage::order(&env, order_id) {
                orders.set(order_id, order);
            }
        }
        orders
    }

    pub fn get_buyer_orders(env: Env, buyer: Address) -> Vec<Order> {
        let mut result = Vec::new(&env);
        for order in Self::get_orders(env.clone()).values() {
            if order.buyer == buyer {
                result.push_back(order);
            }
        }
        result
    }

    pub fn get_supplier_orders(env: Env, supplier: Address) -> Vec<Order> {
        let mut result = Vec::new(&env);
        for order in Self::get_orders(env.clone()).values() {
            if order.supplier == supplier {
                result.push_back(order);
            }
        }
        result
    }

    /// Aggregates the platform overview shown to the admin.
    pub fn get_market_stats(env: Env) -> MarketStats {
        let users = Self::get_users(env.clone());
        let pending_kyb = users
            .values()
            .iter()
            .filter(|u| u.role == Role::Supplier && u.kyb_status == KybStatus::Pending)
            .count() as u32;
        let active_listings = Self::get_active_listings(env.clone()).len();

        let orders = Self::get_orders(env);
        let mut gross_volume_pkr: i128 = 0;
        for order in orders.values() {
            if order.status.is_settled_value() {
                gross_volume_pkr = gross_volume_pkr.saturating_add(order.final_price_pkr);
            }
        }

        MarketStats {
            total_users: users.len(),
            pending_kyb,
            active_listings,
            total_orders: orders.len(),
            gross_volume_pkr,
        }
    }

    /// Returns configuration and status in one call:
    /// (admin, fee_rate, bid_increment, min_window, max_window, is_paused)
    pub fn get_contract_info(env: Env) -> Result<(Address, u32, i128, u64, u64, bool), Error> {
        let (min_window, max_window) = Self::get_auction_window(env.clone());
        Ok((
            Self::get_admin(env.clone())?,
            Self::get_fee_rate(env.clone()),
            Self::get_bid_increment(env.clone()),
            min_window,
            max_window,
            Self::is_paused(env),
        ))
    }

    pub fn get_next_listing_id(env: Env) -> u64 {
        Self::_counter(&env, &NEXT_LISTING_ID)
    }

    pub fn get_next_order_id(env: Env) -> u64 {
        Self::_counter(&env, &NEXT_ORDER_ID)
    }
}
