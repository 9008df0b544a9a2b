/// Broker type identifiers as they appear on the wire.
pub mod broker_types {
    pub const MT5: &str = "MT5";
    pub const CAPITAL: &str = "CAPITAL";
}

/// Returns the human-readable name for a broker type identifier.
pub fn broker_display_name(broker_type: &str) -> &'static str {
    match broker_type {
        broker_types::MT5 => "MetaTrader 5",
        broker_types::CAPITAL => "Capital.com",
        _ => "Unknown broker",
    }
}

