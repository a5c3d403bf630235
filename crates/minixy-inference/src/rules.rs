//! Deterministic rule-based row enrichment.
//!
//! Resolves rows without a model: a small gazetteer fixes country and city
//! (including a city emitted into the country column), domains are cleaned
//! or derived from the company name, and headcounts are mapped onto the
//! bucket enumeration. Output goes through the same [`ResponseValidator`]
//! as model answers.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use minixy_core::{CleanedRow, EmployeeSize, EnrichError, EnrichedRow, Error, Result, RowEnricher};

use crate::enrichment::ResponseValidator;

/// Bucket used when a row carries no usable size.
pub const DEFAULT_BUCKET: EmployeeSize = EmployeeSize::Small;

struct CountryEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    tld: &'static str,
    cities: &'static [&'static str],
}

impl CountryEntry {
    /// Main business city, used when a row names only the country.
    fn default_city(&self) -> &'static str {
        self.cities[0]
    }
}

const GAZETTEER: &[CountryEntry] = &[
    CountryEntry {
        name: "United States",
        aliases: &["usa", "us", "u.s.", "u.s.a.", "united states of america", "america"],
        tld: "us",
        cities: &["New York", "San Francisco", "Los Angeles", "Chicago", "Boston", "Seattle", "Austin"],
    },
    CountryEntry {
        name: "United Kingdom",
        aliases: &["uk", "u.k.", "gb", "great britain", "britain", "england"],
        tld: "uk",
        cities: &["London", "Manchester", "Edinburgh", "Cambridge"],
    },
    CountryEntry {
        name: "Germany",
        aliases: &["de", "deutschland"],
        tld: "de",
        cities: &["Berlin", "Munich", "Hamburg", "Frankfurt"],
    },
    CountryEntry {
        name: "France",
        aliases: &["fr"],
        tld: "fr",
        cities: &["Paris", "Lyon", "Marseille", "Toulouse"],
    },
    CountryEntry {
        name: "Spain",
        aliases: &["es", "españa", "espana"],
        tld: "es",
        cities: &["Madrid", "Barcelona", "Valencia"],
    },
    CountryEntry {
        name: "Italy",
        aliases: &["it", "italia"],
        tld: "it",
        cities: &["Milan", "Rome", "Turin"],
    },
    CountryEntry {
        name: "Netherlands",
        aliases: &["nl", "holland", "the netherlands"],
        tld: "nl",
        cities: &["Amsterdam", "Rotterdam", "Utrecht"],
    },
    CountryEntry {
        name: "Canada",
        aliases: &["ca"],
        tld: "ca",
        cities: &["Toronto", "Vancouver", "Montreal"],
    },
    CountryEntry {
        name: "India",
        aliases: &["in"],
        tld: "in",
        cities: &["Bangalore", "Bengaluru", "Mumbai", "Delhi", "Hyderabad"],
    },
    CountryEntry {
        name: "Japan",
        aliases: &["jp"],
        tld: "jp",
        cities: &["Tokyo", "Osaka"],
    },
    CountryEntry {
        name: "Australia",
        aliases: &["au"],
        tld: "au",
        cities: &["Sydney", "Melbourne"],
    },
    CountryEntry {
        name: "Brazil",
        aliases: &["br", "brasil"],
        tld: "br",
        cities: &["São Paulo", "Rio de Janeiro"],
    },
    CountryEntry {
        name: "Sweden",
        aliases: &["se", "sverige"],
        tld: "se",
        cities: &["Stockholm", "Gothenburg"],
    },
    CountryEntry {
        name: "Switzerland",
        aliases: &["ch", "schweiz", "suisse"],
        tld: "ch",
        cities: &["Zurich", "Geneva"],
    },
    CountryEntry {
        name: "Ireland",
        aliases: &["ie"],
        tld: "ie",
        cities: &["Dublin", "Cork"],
    },
    CountryEntry {
        name: "Israel",
        aliases: &["il"],
        tld: "il",
        cities: &["Tel Aviv", "Jerusalem"],
    },
    CountryEntry {
        name: "China",
        aliases: &["cn", "prc"],
        tld: "cn",
        cities: &["Shanghai", "Beijing", "Shenzhen"],
    },
    CountryEntry {
        name: "Singapore",
        aliases: &["sg"],
        tld: "sg",
        cities: &["Singapore"],
    },
];

fn find_country(value: &str) -> Option<&'static CountryEntry> {
    let needle = value.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    GAZETTEER
        .iter()
        .find(|c| c.name.to_lowercase() == needle || c.aliases.contains(&needle.as_str()))
}

fn find_city(value: &str) -> Option<(&'static str, &'static CountryEntry)> {
    let needle = value.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    GAZETTEER.iter().find_map(|c| {
        c.cities
            .iter()
            .find(|city| city.to_lowercase() == needle)
            .map(|city| (*city, c))
    })
}

fn find_country_by_tld(domain: &str) -> Option<&'static CountryEntry> {
    let tld = domain.rsplit('.').next()?;
    GAZETTEER.iter().find(|c| c.tld == tld)
}

/// True for values shaped like a host name: no whitespace, at least one dot,
/// alphabetic final label.
fn looks_like_domain(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() || v.chars().any(char::is_whitespace) || !v.contains('.') {
        return false;
    }
    let host = clean_domain(v);
    match host.rsplit_once('.') {
        Some((name, tld)) => {
            !name.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Reduce a URL-ish value to a bare lowercase host.
fn clean_domain(value: &str) -> String {
    let mut v = value.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = v.strip_prefix(scheme) {
            v = rest.to_string();
        }
    }
    if let Some(rest) = v.strip_prefix("www.") {
        v = rest.to_string();
    }
    let host = v.split(['/', '?', '#']).next().unwrap_or("");
    host.trim_end_matches('.').to_string()
}

/// `Acme Corp, Inc.` → `acmecorpinc.com`.
fn domain_from_name(name: &str) -> Option<String> {
    let slug: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        None
    } else {
        Some(format!("{}.com", slug))
    }
}

/// Deterministic [`RowEnricher`] for offline use and tests.
pub struct RuleBasedEnricher {
    validator: ResponseValidator,
    number: Regex,
}

impl RuleBasedEnricher {
    pub fn new() -> Result<Self> {
        let number = Regex::new(r"\d[\d,.]*")
            .map_err(|e| Error::Internal(format!("Invalid headcount pattern: {}", e)))?;
        Ok(Self {
            validator: ResponseValidator::new()?,
            number,
        })
    }

    /// Map a free-form size value onto a bucket.
    ///
    /// Exact bucket values win; otherwise the first number is read as a
    /// headcount (a trailing `+` means "more than"). Anything else falls
    /// back to [`DEFAULT_BUCKET`].
    pub fn resolve_bucket(&self, raw: &str) -> EmployeeSize {
        let raw = raw.trim();
        if let Ok(bucket) = raw.parse::<EmployeeSize>() {
            return bucket;
        }
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if let Ok(bucket) = compact.parse::<EmployeeSize>() {
            return bucket;
        }

        let Some(m) = self.number.find(raw) else {
            return DEFAULT_BUCKET;
        };
        let digits: String = m
            .as_str()
            .chars()
            .take_while(|c| *c != '.')
            .filter(|c| c.is_ascii_digit())
            .collect();
        let Ok(mut count) = digits.parse::<u64>() else {
            return DEFAULT_BUCKET;
        };
        if raw[m.end()..].trim_start().starts_with('+') {
            count = count.saturating_add(1);
        }
        EmployeeSize::from_headcount(count)
    }

    fn resolve(&self, row: &CleanedRow) -> std::result::Result<EnrichedRow, EnrichError> {
        let mut country: Option<String> = None;
        let mut city: Option<String> = None;
        let mut domain: Option<String> = None;

        // Domain first: a host name found in any slot is taken as the domain.
        for candidate in [&row.domain, &row.city, &row.country] {
            if looks_like_domain(candidate) {
                domain = Some(clean_domain(candidate));
                break;
            }
        }
        let country_slot = if looks_like_domain(&row.country) { "" } else { row.country.as_str() };
        let city_slot = if looks_like_domain(&row.city) { "" } else { row.city.as_str() };

        if let Some(entry) = find_country(country_slot) {
            country = Some(entry.name.to_string());
        } else if let Some((name, entry)) = find_city(country_slot) {
            debug!(value = %country_slot, "City found in country column");
            city = Some(name.to_string());
            country = Some(entry.name.to_string());
        } else if !country_slot.is_empty() {
            country = Some(country_slot.to_string());
        }

        if let Some(entry) = find_country(city_slot) {
            // Country emitted into the city column.
            debug!(value = %city_slot, "Country found in city column");
            if country.as_deref().map(|c| find_country(c).is_none()).unwrap_or(true) {
                if city.is_none() && !country_slot.is_empty() && find_country(country_slot).is_none() {
                    city = Some(country_slot.to_string());
                }
                country = Some(entry.name.to_string());
            }
        } else if let Some((name, entry)) = find_city(city_slot) {
            city = Some(name.to_string());
            country.get_or_insert_with(|| entry.name.to_string());
        } else if !city_slot.is_empty() {
            city = Some(city_slot.to_string());
        }

        if country.is_none() {
            country = domain
                .as_deref()
                .and_then(find_country_by_tld)
                .map(|c| c.name.to_string());
        }
        if city.is_none() {
            city = country
                .as_deref()
                .and_then(find_country)
                .map(|c| c.default_city().to_string());
        }
        if domain.is_none() {
            domain = domain_from_name(&row.company_name);
        }

        let employee_size = self.resolve_bucket(&row.employee_size);

        let answer = json!({
            "country": country.unwrap_or_default(),
            "employee_size": employee_size,
            "city": city.unwrap_or_default(),
            "domain": domain.unwrap_or_default(),
        });
        self.validator.validate(&answer.to_string())
    }
}

#[async_trait]
impl RowEnricher for RuleBasedEnricher {
    async fn enrich(&self, row: &CleanedRow) -> std::result::Result<EnrichedRow, EnrichError> {
        let mut enriched = self.resolve(row)?;
        if !row.company_name.is_empty() {
            enriched.company_name = Some(row.company_name.clone());
        }
        Ok(enriched)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
