pub mod quotes;

pub use quotes::QuotesSpider;
