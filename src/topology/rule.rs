//! Destination rules.
//!
//! # Responsibilities
//! - Describe where a proxy chain routes to: a whole service, handler
//!   categories of a service, or individual route commands
//! - Build rules from typed lists or from dynamic request parameters
//! - Structural predicates (`is_service`, `is_handler`, `is_route`, `is_valid`)
//! - Order-insensitive rule equality
//!
//! # Design Decisions
//! - The populated fields decide the shape; the shape is kept as an enum so a
//!   rule can never hold commands without categories
//! - Every list is compacted on insertion (set semantics, insertion order kept)
//! - Serialized form is flat: `urls`, `categories`, `commands`,
//!   `excluded_commands`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The structural kind of a rule with its associated lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Matches every handler of the listed services.
    Service { urls: Vec<String> },
    /// Matches the listed handler categories of the listed services.
    Handler {
        urls: Vec<String>,
        categories: Vec<String>,
    },
    /// Matches the listed commands of the listed handler categories.
    Route {
        urls: Vec<String>,
        categories: Vec<String>,
        commands: Vec<String>,
    },
}

impl Shape {
    /// Picks the shape from whatever lists are populated.
    fn from_parts(urls: Vec<String>, categories: Vec<String>, commands: Vec<String>) -> Self {
        let urls = compact(urls);
        let categories = compact(categories);
        let commands = compact(commands);

        if !commands.is_empty() {
            Shape::Route {
                urls,
                categories,
                commands,
            }
        } else if !categories.is_empty() {
            Shape::Handler { urls, categories }
        } else {
            Shape::Service { urls }
        }
    }
}

/// A pattern describing the destination of a proxy chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    shape: Shape,
    excluded_commands: Vec<String>,
}

/// Flat on-disk form of a [`Rule`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RuleRecord {
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    excluded_commands: Vec<String>,
}

impl From<RuleRecord> for Rule {
    fn from(record: RuleRecord) -> Self {
        Self {
            shape: Shape::from_parts(record.urls, record.categories, record.commands),
            excluded_commands: compact(record.excluded_commands),
        }
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let excluded_commands = rule.excluded_commands;
        match rule.shape {
            Shape::Service { urls } => RuleRecord {
                urls,
                excluded_commands,
                ..Default::default()
            },
            Shape::Handler { urls, categories } => RuleRecord {
                urls,
                categories,
                excluded_commands,
                ..Default::default()
            },
            Shape::Route {
                urls,
                categories,
                commands,
            } => RuleRecord {
                urls,
                categories,
                commands,
                excluded_commands,
            },
        }
    }
}

impl Default for Rule {
    /// An empty service rule: a placeholder waiting for urls.
    fn default() -> Self {
        Self {
            shape: Shape::Service { urls: Vec::new() },
            excluded_commands: Vec::new(),
        }
    }
}

impl Rule {
    /// Rule targeting whole services.
    pub fn service<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_lists(strings(urls), Vec::new(), Vec::new())
    }

    /// Rule targeting handler categories. `urls` may be empty for a rule
    /// that is completed later.
    pub fn handler<I, S, J, T>(urls: I, categories: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::from_lists(strings(urls), strings(categories), Vec::new())
    }

    /// Rule targeting route commands.
    pub fn route<I, S, J, T, K, U>(urls: I, categories: J, commands: K) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
        K: IntoIterator<Item = U>,
        U: Into<String>,
    {
        Self::from_lists(strings(urls), strings(categories), strings(commands))
    }

    fn from_lists(urls: Vec<String>, categories: Vec<String>, commands: Vec<String>) -> Self {
        Self {
            shape: Shape::from_parts(urls, categories, commands),
            excluded_commands: Vec::new(),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn urls(&self) -> &[String] {
        match &self.shape {
            Shape::Service { urls } | Shape::Handler { urls, .. } | Shape::Route { urls, .. } => {
                urls
            }
        }
    }

    pub fn categories(&self) -> &[String] {
        match &self.shape {
            Shape::Service { .. } => &[],
            Shape::Handler { categories, .. } | Shape::Route { categories, .. } => categories,
        }
    }

    pub fn commands(&self) -> &[String] {
        match &self.shape {
            Shape::Route { commands, .. } => commands,
            _ => &[],
        }
    }

    pub fn excluded_commands(&self) -> &[String] {
        &self.excluded_commands
    }

    /// Adds service urls, skipping the ones already present.
    pub fn add_urls<I, S>(&mut self, new_urls: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls = match &mut self.shape {
            Shape::Service { urls } | Shape::Handler { urls, .. } | Shape::Route { urls, .. } => {
                urls
            }
        };
        for url in new_urls {
            push_unique(urls, url.into());
        }
        self
    }

    /// Adds commands to the exclusion list. Idempotent.
    pub fn exclude_commands<I, S>(&mut self, commands: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for command in commands {
            push_unique(&mut self.excluded_commands, command.into());
        }
        self
    }

    /// Replaces the exclusion list.
    pub fn set_excluded_commands<I, S>(&mut self, commands: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_commands = compact(strings(commands));
        self
    }

    pub fn is_service(&self) -> bool {
        matches!(&self.shape, Shape::Service { urls } if !urls.is_empty())
    }

    pub fn is_handler(&self) -> bool {
        matches!(
            &self.shape,
            Shape::Handler { urls, categories } if !urls.is_empty() && !categories.is_empty()
        )
    }

    pub fn is_route(&self) -> bool {
        matches!(
            &self.shape,
            Shape::Route { urls, categories, commands }
                if !urls.is_empty() && !categories.is_empty() && !commands.is_empty()
        )
    }

    /// True if urls, categories and commands are all empty.
    pub fn is_empty(&self) -> bool {
        self.urls().is_empty() && self.categories().is_empty() && self.commands().is_empty()
    }

    /// True if every command is excluded.
    ///
    /// Always false when there are no categories or no exclusions.
    pub fn is_empty_commands(&self) -> bool {
        if self.categories().is_empty() || self.excluded_commands.is_empty() {
            return false;
        }

        self.commands()
            .iter()
            .all(|command| self.excluded_commands.contains(command))
    }

    pub fn is_valid(&self) -> bool {
        !self.is_empty()
            && !self.is_empty_commands()
            && (self.is_service() || self.is_handler() || self.is_route())
    }

    /// Order-insensitive comparison of every list.
    pub fn is_equal(&self, other: &Rule) -> bool {
        same_set(self.urls(), other.urls())
            && same_set(self.categories(), other.categories())
            && same_set(self.commands(), other.commands())
            && same_set(&self.excluded_commands, &other.excluded_commands)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

/// Compares two optional rules. A missing rule is never equal to anything,
/// itself included.
pub fn is_equal_rule(first: Option<&Rule>, second: Option<&Rule>) -> bool {
    match (first, second) {
        (Some(first), Some(second)) => first.is_equal(second),
        _ => false,
    }
}

//
// Dynamic factories for request parameters.
//
// Each argument is either a string or an array of strings. Any other value,
// or a wrong number of arguments, yields `None`.
//

/// Zero or one argument: the service urls.
pub fn new_service_destination(args: &[Value]) -> Option<Rule> {
    match args {
        [] => Some(Rule::default()),
        [urls] => Some(Rule::service(string_list(urls)?)),
        _ => None,
    }
}

/// One or two arguments: optional urls, then categories.
pub fn new_handler_destination(args: &[Value]) -> Option<Rule> {
    match args {
        [categories] => Some(Rule::handler(Vec::<String>::new(), string_list(categories)?)),
        [urls, categories] => Some(Rule::handler(string_list(urls)?, string_list(categories)?)),
        _ => None,
    }
}

/// Two or three arguments: optional urls, then categories, then commands.
pub fn new_destination(args: &[Value]) -> Option<Rule> {
    match args {
        [categories, commands] => Some(Rule::route(
            Vec::<String>::new(),
            string_list(categories)?,
            string_list(commands)?,
        )),
        [urls, categories, commands] => Some(Rule::route(
            string_list(urls)?,
            string_list(categories)?,
            string_list(commands)?,
        )),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn compact(items: Vec<String>) -> Vec<String> {
    let mut compacted = Vec::with_capacity(items.len());
    for item in items {
        push_unique(&mut compacted, item);
    }
    compacted
}

fn same_set(first: &[String], second: &[String]) -> bool {
    first.iter().all(|item| second.contains(item)) && second.iter().all(|item| first.contains(item))
}
