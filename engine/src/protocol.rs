// Binary order message protocol
//
// Fixed-size frames parsed zero-copy with zerocopy. Multi-byte fields are
// big-endian on the wire (network byte order); the byteorder wrapper
// types swap on access so the struct needs no manual unpacking.

use common::{AccountId, OrderId, OrderType, Price, Side, Volume};
use zerocopy::byteorder::{BigEndian, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Incoming order frame.
///
/// Layout (34 bytes total):
/// - order_type: u8 (1 byte) - OrderType discriminant
/// - side: u8 (1 byte) - Side discriminant
/// - order_id: u64 (8 bytes, big-endian)
/// - price: u64 (8 bytes, big-endian) - ticks
/// - quantity: u64 (8 bytes, big-endian)
/// - account_id: u64 (8 bytes, big-endian)
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct OrderFrame {
    pub order_type: u8,
    pub side: u8,
    pub order_id: U64<BigEndian>,
    pub price: U64<BigEndian>,
    pub quantity: U64<BigEndian>,
    pub account_id: U64<BigEndian>,
}

/// Size of OrderFrame in bytes
pub const ORDER_FRAME_SIZE: usize = std::mem::size_of::<OrderFrame>();

impl OrderFrame {
    #[inline]
    pub fn new(
        order_type: OrderType,
        side: Side,
        order_id: OrderId,
        price: Price,
        quantity: Volume,
        account_id: AccountId,
    ) -> Self {
        Self {
            order_type: order_type as u8,
            side: side as u8,
            order_id: U64::new(order_id),
            price: U64::new(price),
            quantity: U64::new(quantity),
            account_id: U64::new(account_id),
        }
    }

    /// Byte view of this frame (zero-copy)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        AsBytes::as_bytes(self)
    }

    /// Reference into a byte slice (zero-copy). `None` if the slice is
    /// not exactly one frame.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        FromBytes::ref_from(bytes)
    }

    /// Validates the discriminants and converts to host-order fields.
    #[inline]
    pub fn decode(&self) -> Option<OrderCommand> {
        let order_type = OrderType::from_u8(self.order_type)?;
        let side = Side::from_u8(self.side)?;
        Some(OrderCommand {
            order_type,
            side,
            order_id: self.order_id.get(),
            price: self.price.get(),
            quantity: self.quantity.get(),
            account_id: self.account_id.get(),
        })
    }
}

/// A decoded order message: what the ingress thread hands the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCommand {
    pub order_type: OrderType,
    pub side: Side,
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Volume,
    pub account_id: AccountId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        // 1 + 1 + 8 + 8 + 8 + 8
        assert_eq!(ORDER_FRAME_SIZE, 34);
    }

    #[test]
    fn test_roundtrip() {
        let frame = OrderFrame::new(OrderType::Limit, Side::Bid, 42, 10050, 100, 7);
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), ORDER_FRAME_SIZE);

        let parsed = OrderFrame::from_bytes(bytes).unwrap();
        let cmd = parsed.decode().unwrap();
        assert_eq!(cmd.order_type, OrderType::Limit);
        assert_eq!(cmd.side, Side::Bid);
        assert_eq!(cmd.order_id, 42);
        assert_eq!(cmd.price, 10050);
        assert_eq!(cmd.quantity, 100);
        assert_eq!(cmd.account_id, 7);
    }

    #[test]
    fn test_fields_are_big_endian() {
        let frame = OrderFrame::new(OrderType::Market, Side::Ask, 1, 0, 0, 0);
        let bytes = frame.as_bytes();
        // order_id starts at offset 2; MSB first
        assert_eq!(&bytes[2..10], &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_bad_discriminants_rejected() {
        let mut frame = OrderFrame::new(OrderType::Limit, Side::Bid, 1, 1, 1, 1);
        frame.order_type = 9;
        assert!(frame.decode().is_none());

        let mut frame = OrderFrame::new(OrderType::Limit, Side::Bid, 1, 1, 1, 1);
        frame.side = 2;
        assert!(frame.decode().is_none());
    }

    #[test]
    fn test_from_bytes_wrong_size() {
        let short = [0u8; 10];
        assert!(OrderFrame::from_bytes(&short).is_none());
        let long = [0u8; 64];
        assert!(OrderFrame::from_bytes(&long).is_none());
    }
}
