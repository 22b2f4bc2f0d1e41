use std::borrow::Cow;

/// Provider identifier - mostly static constants ("FINNHUB", "ALPHA_VANTAGE", "YAHOO")
pub type ProviderId = Cow<'static, str>;
