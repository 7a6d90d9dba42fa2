use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, U256};
use std::collections::HashMap;

use crate::constants::{ROUTES, TOKENS};
use crate::error::AppError;

/// An ERC20 token the runner knows by symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

/// Symbol -> token lookup table.
#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    tokens: HashMap<String, Token>,
}

impl TokenBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference deployment's token table.
    pub fn reference() -> Self {
        let mut book = Self::new();
        for (symbol, address, decimals) in TOKENS {
            book.insert(symbol, Token { address, decimals });
        }
        book
    }

    pub fn insert(&mut self, symbol: impl Into<String>, token: Token) {
        self.tokens.insert(symbol.into(), token);
    }

    pub fn resolve(&self, symbol: &str) -> Result<Token, AppError> {
        self.tokens
            .get(symbol)
            .copied()
            .ok_or_else(|| AppError::UnknownToken(symbol.to_string()))
    }
}

/// One configured directed swap with a fixed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub input: String,
    pub output: String,
    /// Amount of `input` in natural units, e.g. "0.01".
    pub amount: String,
    pub enabled: bool,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: output.into(),
            amount: amount.into(),
            enabled: true,
        }
    }
}

/// Ordered set of routes. Enable flags are toggled by the caller between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteBook {
    routes: Vec<Route>,
}

impl RouteBook {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn reference() -> Self {
        Self::new(
            ROUTES
                .iter()
                .map(|(name, input, output, amount)| Route::new(*name, *input, *output, *amount))
                .collect(),
        )
    }

    /// Replaces the amount of the route called `name`. Returns false if no such route.
    pub fn set_amount(&mut self, name: &str, amount: impl Into<String>) -> bool {
        match self.routes.iter_mut().find(|r| r.name == name) {
            Some(route) => {
                route.amount = amount.into();
                true
            }
            None => false,
        }
    }

    /// Flips the route at `index` (zero based) and returns its new state.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let route = self.routes.get_mut(index)?;
        route.enabled = !route.enabled;
        Some(route.enabled)
    }

    pub fn all(&self) -> &[Route] {
        &self.routes
    }

    /// Enabled routes in insertion order.
    pub fn enabled(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.enabled)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Token path handed to the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwapPath {
    pub tokens: Vec<Address>,
}

impl SwapPath {
    pub fn direct(input: Address, output: Address) -> Self {
        Self {
            tokens: vec![input, output],
        }
    }
}

impl From<SwapPath> for Vec<Address> {
    fn from(path: SwapPath) -> Self {
        path.tokens
    }
}

/// Converts a natural-unit decimal string into the token's base units.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, AppError> {
    let amount = amount.trim();
    let invalid = |reason: &str| AppError::Amount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };
    if amount.starts_with('-') {
        return Err(invalid("must not be negative"));
    }
    let value = parse_units(amount, decimals)
        .map_err(|e| invalid(&e.to_string()))?
        .get_absolute();
    if value.is_zero() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(value)
}
