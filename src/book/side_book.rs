use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use super::types::PriceLevel;

/// One side (bids or asks) of an order book: a price-ordered map to
/// quantity. Invariant: no zero-quantity entries are ever stored.
#[derive(Debug, Clone, Default)]
pub struct SideBook {
    levels: BTreeMap<OrderedFloat<f64>, f64>,
}

impl SideBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Upsert a quantity at a price, or remove the price if quantity is zero.
    pub fn apply_level(&mut self, level: PriceLevel) {
        if level.quantity == 0.0 {
            self.levels.remove(&OrderedFloat(level.price));
        } else {
            self.levels.insert(OrderedFloat(level.price), level.quantity);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Highest price stored (best bid, when this is the bid side).
    pub fn max_price(&self) -> Option<f64> {
        self.levels.keys().next_back().map(|p| p.into_inner())
    }

    /// Lowest price stored (best ask, when this is the ask side).
    pub fn min_price(&self) -> Option<f64> {
        self.levels.keys().next().map(|p| p.into_inner())
    }

    /// Top `depth` levels descending by price.
    pub fn top_desc(&self, depth: usize) -> Vec<PriceLevel> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(p, q)| PriceLevel {
                price: p.into_inner(),
                quantity: *q,
            })
            .collect()
    }

    /// Top `depth` levels ascending by price.
    pub fn top_asc(&self, depth: usize) -> Vec<PriceLevel> {
        self.levels
            .iter()
            .take(depth)
            .map(|(p, q)| PriceLevel {
                price: p.into_inner(),
                quantity: *q,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn all_prices_ascending(&self) -> Vec<f64> {
        self.levels.keys().map(|p| p.into_inner()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(price: f64, quantity: f64) -> PriceLevel {
        PriceLevel { price, quantity }
    }

    #[test]
    fn upsert_then_zero_removes() {
        let mut sb = SideBook::new();
        sb.apply_level(lvl(100.0, 1.0));
        assert_eq!(sb.max_price(), Some(100.0));
        sb.apply_level(lvl(100.0, 0.0));
        assert!(sb.is_empty());
    }

    #[test]
    fn no_zero_quantity_entries_ever_stored() {
        let mut sb = SideBook::new();
        sb.apply_level(lvl(100.0, 1.0));
        sb.apply_level(lvl(101.0, 2.0));
        sb.apply_level(lvl(100.0, 0.0));
        assert_eq!(sb.len(), 1);
        assert_eq!(sb.max_price(), Some(101.0));
    }

    #[test]
    fn ordering_is_monotonic() {
        let mut sb = SideBook::new();
        for p in [30010.0, 29999.0, 30000.0] {
            sb.apply_level(lvl(p, 1.0));
        }
        let prices = sb.all_prices_ascending();
        assert_eq!(prices, vec![29999.0, 30000.0, 30010.0]);
        assert_eq!(sb.min_price(), Some(29999.0));
        assert_eq!(sb.max_price(), Some(30010.0));
    }
}
