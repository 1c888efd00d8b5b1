// SPDX-License-Identifier: MIT

/// Static currency reference data. Process-wide constant table, never
/// persisted; `popularity` is a fixed global rank (lower = more popular)
/// used to order currencies a user has never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub popularity: u32,
}

pub const CURRENCIES: &[Currency] = &[
    Currency { code: "USD", symbol: "$", name: "US Dollar", popularity: 1 },
    Currency { code: "EUR", symbol: "€", name: "Euro", popularity: 2 },
    Currency { code: "JPY", symbol: "¥", name: "Japanese Yen", popularity: 3 },
    Currency { code: "GBP", symbol: "£", name: "British Pound", popularity: 4 },
    Currency { code: "CNY", symbol: "¥", name: "Chinese Yuan", popularity: 5 },
    Currency { code: "AUD", symbol: "A$", name: "Australian Dollar", popularity: 6 },
    Currency { code: "CAD", symbol: "C$", name: "Canadian Dollar", popularity: 7 },
    Currency { code: "CHF", symbol: "CHF", name: "Swiss Franc", popularity: 8 },
    Currency { code: "HKD", symbol: "HK$", name: "Hong Kong Dollar", popularity: 9 },
    Currency { code: "SGD", symbol: "S$", name: "Singapore Dollar", popularity: 10 },
    Currency { code: "SEK", symbol: "kr", name: "Swedish Krona", popularity: 11 },
    Currency { code: "KRW", symbol: "₩", name: "South Korean Won", popularity: 12 },
    Currency { code: "NOK", symbol: "kr", name: "Norwegian Krone", popularity: 13 },
    Currency { code: "NZD", symbol: "NZ$", name: "New Zealand Dollar", popularity: 14 },
    Currency { code: "INR", symbol: "₹", name: "Indian Rupee", popularity: 15 },
    Currency { code: "MXN", symbol: "MX$", name: "Mexican Peso", popularity: 16 },
    Currency { code: "TWD", symbol: "NT$", name: "New Taiwan Dollar", popularity: 17 },
    Currency { code: "ZAR", symbol: "R", name: "South African Rand", popularity: 18 },
    Currency { code: "BRL", symbol: "R$", name: "Brazilian Real", popularity: 19 },
    Currency { code: "DKK", symbol: "kr", name: "Danish Krone", popularity: 20 },
    Currency { code: "PLN", symbol: "zł", name: "Polish Zloty", popularity: 21 },
    Currency { code: "THB", symbol: "฿", name: "Thai Baht", popularity: 22 },
    Currency { code: "ILS", symbol: "₪", name: "Israeli Shekel", popularity: 23 },
    Currency { code: "IDR", symbol: "Rp", name: "Indonesian Rupiah", popularity: 24 },
    Currency { code: "CZK", symbol: "Kč", name: "Czech Koruna", popularity: 25 },
    Currency { code: "AED", symbol: "د.إ", name: "UAE Dirham", popularity: 26 },
    Currency { code: "TRY", symbol: "₺", name: "Turkish Lira", popularity: 27 },
    Currency { code: "HUF", symbol: "Ft", name: "Hungarian Forint", popularity: 28 },
    Currency { code: "CLP", symbol: "CLP$", name: "Chilean Peso", popularity: 29 },
    Currency { code: "SAR", symbol: "﷼", name: "Saudi Riyal", popularity: 30 },
];

/// Exact-match lookup. Deliberately case-sensitive: usage records key on the
/// code as written, and "eur" is a different key from "EUR".
pub fn find_currency(code: &str) -> Option<&'static Currency> {
    CURRENCIES.iter().find(|c| c.code == code)
}

pub fn is_supported(code: &str) -> bool {
    find_currency(code).is_some()
}
