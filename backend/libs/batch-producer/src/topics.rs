use std::fmt;
use std::str::FromStr;

/// Topics the indexer produces to or consumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KafkaTopic {
    ToEnder,
    ToVulcan,
    ToWebsocketsOrderbooks,
    ToWebsocketsSubaccounts,
    ToWebsocketsTrades,
    ToWebsocketsMarkets,
    ToWebsocketsCandles,
    ToWebsocketsBlockHeight,
}

impl KafkaTopic {
    pub const ALL: [KafkaTopic; 8] = [
        KafkaTopic::ToEnder,
        KafkaTopic::ToVulcan,
        KafkaTopic::ToWebsocketsOrderbooks,
        KafkaTopic::ToWebsocketsSubaccounts,
        KafkaTopic::ToWebsocketsTrades,
        KafkaTopic::ToWebsocketsMarkets,
        KafkaTopic::ToWebsocketsCandles,
        KafkaTopic::ToWebsocketsBlockHeight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KafkaTopic::ToEnder => "to-ender",
            KafkaTopic::ToVulcan => "to-vulcan",
            KafkaTopic::ToWebsocketsOrderbooks => "to-websockets-orderbooks",
            KafkaTopic::ToWebsocketsSubaccounts => "to-websockets-subaccounts",
            KafkaTopic::ToWebsocketsTrades => "to-websockets-trades",
            KafkaTopic::ToWebsocketsMarkets => "to-websockets-markets",
            KafkaTopic::ToWebsocketsCandles => "to-websockets-candles",
            KafkaTopic::ToWebsocketsBlockHeight => "to-websockets-block-height",
        }
    }

    /// Topics fanned out to websocket clients
    pub fn is_websocket(&self) -> bool {
        self.as_str().starts_with("to-websockets-")
    }
}

impl AsRef<str> for KafkaTopic {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for KafkaTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KafkaTopic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KafkaTopic::ALL
            .iter()
            .copied()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| format!("Unknown topic: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_parse_back() {
        for topic in KafkaTopic::ALL {
            assert_eq!(topic.as_str().parse::<KafkaTopic>(), Ok(topic));
        }
        assert!("to-nowhere".parse::<KafkaTopic>().is_err());
    }

    #[test]
    fn test_websocket_topics() {
        assert!(KafkaTopic::ToWebsocketsSubaccounts.is_websocket());
        assert!(!KafkaTopic::ToEnder.is_websocket());
    }
}
