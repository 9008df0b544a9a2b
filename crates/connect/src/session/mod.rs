mod resolver;

pub use resolver::SessionResolver;
