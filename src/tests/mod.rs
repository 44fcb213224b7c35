mod test_common_validation;
mod test_config;
mod test_dispatcher;
mod test_tier_resolver;
