/*!
 * Type Definitions for the Textile Waste Exchange Contract
 *
 * Accounts, waste lots, bids, escrow orders and notifications, plus the error
 * codes and event topics published by the contract. Monetary values are whole
 * PKR held as `i128`; confidences and scores are basis points (0..=10_000).
 */

use soroban_sdk::{contracterror, contracttype, symbol_short, Address, Map, String, Symbol, Vec};

/// Upper bound for any basis-point value (100%).
pub const MAX_BASIS_POINTS: u32 = 10_000;

// ================================================================================================
// ACCOUNTS
// ================================================================================================

/// Role an account registered with. Each account holds exactly one role.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Supplier,
    Buyer,
    Admin,
}

/// Know-Your-Business state of an account.
///
/// Buyers and admins are `NotRequired`. Suppliers register as `Pending`; only
/// an admin moves them to `Verified` or `Rejected`, and only `Verified`
/// suppliers may publish lots.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KybStatus {
    NotRequired,
    Pending,
    Verified,
    Rejected,
}

/// A registered marketplace account.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub account: Address,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub company_name: String,
    pub kyb_status: KybStatus,
    pub created_at: u64,
}

// ================================================================================================
// LISTINGS
// ================================================================================================

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaterialType {
    Cotton,
    Polyester,
    Blend,
    Denim,
    Knit,
    Nylon,
    Wool,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColorClass {
    White,
    Light,
    Dark,
    Mixed,
    Denim,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WasteGrade {
    A,
    B,
    C,
    Mixed,
}

/// Lifecycle status of a waste lot.
///
/// # State Transition Rules
/// - Draft → Active (owner publishes, KYB verified)
/// - Draft → Cancelled
/// - Active → Sold (buy-now or auction settlement with a winning bid)
/// - Active → Cancelled (owner with no bids, or admin)
/// - Active → Expired (auction ended without bids)
///
/// Sold, Cancelled and Expired are final.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListingStatus {
    Draft,
    Active,
    Sold,
    Cancelled,
    Expired,
}

impl ListingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Sold | ListingStatus::Cancelled | ListingStatus::Expired)
    }
}

/// Snapshot of the image classifier's output at listing time.
///
/// The contract stores it as supplied; it does not run classification itself.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Classification {
    /// Confidence in `Listing::material_type`, basis points
    pub material_confidence: u32,
    /// Confidence in `Listing::color_class`, basis points
    pub color_confidence: u32,
    /// Confidence in `Listing::grade`, basis points
    pub grade_confidence: u32,
    pub estimated_weight_kg: u32,
    /// How the weight was estimated, e.g. "volume_estimation"
    pub weight_method: String,
    /// Fiber name → share in basis points
    pub fiber_blend: Map<String, u32>,
    pub defect_detected: bool,
    /// Basis points
    pub recyclability_score: u32,
    pub suggested_uses: Vec<String>,
}

/// Supplier-provided fields for a new lot.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListingDraft {
    pub material_type: MaterialType,
    pub color_class: ColorClass,
    pub grade: WasteGrade,
    pub weight_kg: u32,
    pub min_order_kg: u32,
    pub floor_price_pkr: i128,
    pub buy_now_price_pkr: Option<i128>,
    pub auction_end_at: u64,
    pub location: String,
    pub images: Vec<String>,
    pub classification: Classification,
}

/// A single lot of textile waste offered by a supplier.
///
/// `current_bid_pkr` and `highest_bid_id` move together: when present,
/// the current bid is the amount of bid `highest_bid_id`, and it is never
/// below `floor_price_pkr`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listing {
    pub id: u64,
    pub supplier: Address,
    /// Supplier's company name at creation time
    pub supplier_name: String,
    pub supplier_location: String,
    pub material_type: MaterialType,
    pub color_class: ColorClass,
    pub grade: WasteGrade,
    pub weight_kg: u32,
    pub min_order_kg: u32,
    pub floor_price_pkr: i128,
    pub buy_now_price_pkr: Option<i128>,
    pub status: ListingStatus,
    pub auction_end_at: u64,
    pub images: Vec<String>,
    pub classification: Classification,
    pub current_bid_pkr: Option<i128>,
    pub highest_bid_id: Option<u64>,
    pub bids_count: u32,
    pub created_at: u64,
}

/// An accepted bid. Never modified after creation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bid {
    pub id: u64,
    pub listing_id: u64,
    pub buyer: Address,
    pub amount_pkr: i128,
    pub created_at: u64,
}

// ================================================================================================
// ORDERS
// ================================================================================================

/// Escrow state of an order.
///
/// # State Transition Rules
/// - Pending → Paid (buyer pays a won auction into escrow)
/// - Paid → Delivered (buyer confirms, escrow released)
/// - Paid → Disputed
/// - Disputed → Delivered (admin releases to supplier)
/// - Disputed → Refunded (admin refunds buyer)
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Disputed,
    Refunded,
}

impl OrderStatus {
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Paid, OrderStatus::Delivered)
                | (OrderStatus::Paid, OrderStatus::Disputed)
                | (OrderStatus::Disputed, OrderStatus::Delivered)
                | (OrderStatus::Disputed, OrderStatus::Refunded)
        )
    }

    /// Orders whose value counts towards traded volume.
    pub fn is_settled_value(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Delivered)
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Order {
    pub id: u64,
    pub listing_id: u64,
    pub supplier: Address,
    pub buyer: Address,
    pub final_price_pkr: i128,
    /// Charged to the buyer on top of `final_price_pkr`
    pub platform_fee_pkr: i128,
    pub status: OrderStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Admin's decision on a disputed order.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisputeResolution {
    /// Release escrow to the supplier; the order becomes Delivered
    ReleaseToSupplier,
    /// Return escrow to the buyer; the order becomes Refunded
    RefundToBuyer,
}

// ================================================================================================
// NOTIFICATIONS
// ================================================================================================

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Outbid,
    NewBid,
    ItemSold,
    AuctionWon,
    AuctionExpired,
    ListingCancelled,
    OrderPaid,
    DeliveryConfirmed,
    OrderDisputed,
    OrderStatusChanged,
    DisputeResolved,
    KybVerified,
    KybRejected,
}

/// A message addressed to one account.
///
/// `subject_id` is the listing id for auction notifications and the order id
/// for escrow notifications; it is 0 for KYB notifications.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub recipient: Address,
    pub kind: NotificationKind,
    pub message: String,
    pub subject_id: u64,
    pub amount_pkr: i128,
    pub read: bool,
    pub created_at: u64,
}

// ================================================================================================
// REPORTING
// ================================================================================================

/// Platform overview for the admin dashboard.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarketStats {
    pub total_users: u32,
    pub pending_kyb: u32,
    pub active_listings: u32,
    pub total_orders: u32,
    /// Sum of `final_price_pkr` over Paid and Delivered orders
    pub gross_volume_pkr: i128,
}

// ================================================================================================
// ERROR DEFINITIONS
// ================================================================================================

/// Error codes returned by every fallible contract function.
///
/// # Error Code Ranges
/// - 1-5: missing state
/// - 6-11: identity and access control
/// - 12-20, 26: business rule violations
/// - 21-25: input validation
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    // ========== Missing State (1-5) ==========

    /// `initialize` has not been called
    NotInitialized = 1,
    UserNotFound = 2,
    ListingNotFound = 3,
    OrderNotFound = 4,
    NotificationNotFound = 5,

    // ========== Identity & Access (6-11) ==========

    /// Caller is not the owner, participant or recipient the operation requires
    Unauthorized = 6,
    NotSupplier = 7,
    NotBuyer = 8,
    /// Publishing requires a verified supplier
    KybNotVerified = 9,
    UserAlreadyExists = 10,
    EmailTaken = 11,

    // ========== Business Rules (12-20) ==========

    InvalidListingStatus = 12,
    InvalidOrderStatus = 13,
    /// KYB can only be set to Verified or Rejected
    InvalidKybStatus = 14,
    AuctionEnded = 15,
    AuctionNotEnded = 16,
    /// Bid is below the floor price or does not beat the current bid by the increment
    BidTooLow = 17,
    NoBuyNowPrice = 18,
    /// Suppliers cannot cancel or expire a lot that already has bids
    ListingHasBids = 19,
    ContractPaused = 20,

    // ========== Validation (21-25) ==========

    InvalidAmount = 21,
    InvalidWeight = 22,
    InvalidAuctionWindow = 23,
    InvalidClassification = 24,
    /// Missing email or name
    InvalidProfile = 25,

    /// Bidding already reached the buy-now price
    BuyNowClosed = 26,
}

// ================================================================================================
// STORAGE KEYS
// ================================================================================================

/// Keys of the per-record entries kept in persistent storage.
///
/// Sequences (an account's inbox, a lot's bid history) are stored one entry
/// per position so that appending never rewrites earlier entries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    User(Address),
    /// Registration index -> account
    AccountAt(u64),
    Email(String),
    Listing(u64),
    Bid(u64),
    /// (listing_id, position) -> bid id, oldest at position 0
    ListingBid(u64, u32),
    Order(u64),
    Notification(u64),
    InboxLen(Address),
    /// (recipient, position) -> notification id, oldest at position 0
    InboxEntry(Address, u32),
}

// ================================================================================================
// EVENT TOPICS
// ================================================================================================

/// Data: (role)
pub const USER_REGISTERED: Symbol = symbol_short!("user_reg");

/// Data: (listing_id, floor_price_pkr, status)
pub const LISTING_CREATED: Symbol = symbol_short!("lst_crt");

/// Data: (listing_id)
pub const LISTING_PUBLISHED: Symbol = symbol_short!("lst_pub");

/// Data: (listing_id, status)
pub const LISTING_STATUS: Symbol = symbol_short!("lst_stat");

/// Data: (listing_id, bid_id, amount_pkr)
pub const BID_PLACED: Symbol = symbol_short!("bid_plc");

/// Data: (listing_id, order_id, final_price_pkr)
pub const BOUGHT_NOW: Symbol = symbol_short!("buy_now");

/// Data: (listing_id, status)
pub const AUCTION_CLOSED: Symbol = symbol_short!("auc_cls");

/// Data: (order_id)
pub const ORDER_PAID: Symbol = symbol_short!("ord_paid");

/// Data: (order_id)
pub const ORDER_DELIVERED: Symbol = symbol_short!("ord_dlv");

/// Data: (order_id, status)
pub const ORDER_STATUS: Symbol = symbol_short!("ord_stat");

/// Data: (order_id)
pub const DISPUTE_RAISED: Symbol = symbol_short!("dis_rais");

/// Data: (order_id, resolution)
pub const DISPUTE_RESOLVED: Symbol = symbol_short!("dis_resl");

/// Data: (status)
pub const KYB_UPDATED: Symbol = symbol_short!("kyb_upd");

/// Data: new admin address
pub const ADMIN_UPDATED: Symbol = symbol_short!("adm_upd");
