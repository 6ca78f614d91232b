//! The single, versioned table of fallback strategies for every logical UI target.
//!
//! Workflow states ask for targets by name; adding a fallback after a markup
//! change is a one-place edit here. Bump [`TABLE_VERSION`] when entries change.

use serde::Serialize;
use std::time::Duration;

use crate::config::Timeouts;
use crate::locator::{LocatorStrategy, StrategyList, xpath_literal};

pub const TABLE_VERSION: u32 = 3;

/// Ordered strategies for each target, with timeouts taken from configuration
#[derive(Debug, Clone)]
pub struct StrategyTable {
    navigation: Duration,
    configurator: Duration,
    element: Duration,
    probe: Duration,
}

impl StrategyTable {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self {
            navigation: timeouts.navigation(),
            configurator: timeouts.configurator(),
            element: timeouts.element(),
            probe: timeouts.probe(),
        }
    }

    /// Root content marker that proves the product finder rendered
    pub fn page_root(&self) -> StrategyList {
        StrategyList::new(
            "page root",
            vec![
                LocatorStrategy::css("iaa-root", self.navigation),
                LocatorStrategy::css("main, #app, #root", self.probe),
                LocatorStrategy::css("body", self.probe),
            ],
        )
    }

    /// Container holding every product card; the last entry degrades to the whole page
    pub fn product_collection(&self) -> StrategyList {
        StrategyList::new(
            "product collection",
            vec![
                LocatorStrategy::css("iaa-product-listing", self.element),
                LocatorStrategy::structural(
                    ".//div[./div[contains(concat(' ', normalize-space(@class), ' '), ' product-card ')]]",
                    self.probe,
                ),
                LocatorStrategy::css("body", self.probe),
            ],
        )
    }

    /// The card in the product collection that displays `name`
    pub fn product_card(&self, name: &str) -> StrategyList {
        let lit = xpath_literal(name);
        StrategyList::new(
            format!("product card '{}'", name),
            vec![
                LocatorStrategy::structural(
                    format!(
                        ".//div[contains(concat(' ', normalize-space(@class), ' '), ' product-card ')]\
                         [.//*[contains(@class, 'product-title') or contains(@class, 'product-name')]\
                         [contains(normalize-space(.), {lit})]]"
                    ),
                    self.element,
                ),
                LocatorStrategy::structural(
                    format!(
                        ".//*[contains(@class, 'product-name')][contains(normalize-space(.), {lit})]\
                         /ancestor::div[.//a[@id='create']][1]"
                    ),
                    self.probe,
                ),
                LocatorStrategy::structural(
                    format!(
                        ".//*[self::h3 or self::h4][contains(normalize-space(.), {lit})]\
                         /ancestor::div[contains(@class, 'product')][1]"
                    ),
                    self.probe,
                ),
            ],
        )
    }

    /// The "configure / solution" trigger inside a product card
    pub fn configure_trigger(&self) -> StrategyList {
        StrategyList::new(
            "configure trigger",
            vec![
                LocatorStrategy::id("create", self.element),
                LocatorStrategy::css(".action-buttons .action-items a", self.probe),
                LocatorStrategy::text_in("a", "解决方案", self.probe),
                LocatorStrategy::text_in("button", "Solution", self.probe),
            ],
        )
    }

    /// Container the embedded configurator mounts into
    pub fn configurator_root(&self) -> StrategyList {
        StrategyList::new(
            "configurator root",
            vec![
                LocatorStrategy::css("iaa-dimensions-shell", self.configurator),
                LocatorStrategy::css("form.configurator, .dimensions-form", self.probe),
            ],
        )
    }

    /// Generation/export control: attributes first, form position second, text last
    pub fn generate_trigger(&self) -> StrategyList {
        let mut strategies = vec![
            LocatorStrategy::css("button.btn-download[type='submit']", self.element),
            LocatorStrategy::css("button.btn-download", self.probe),
            LocatorStrategy::structural(".//iaa-dimensions-shell//form//button[last()]", self.probe),
            LocatorStrategy::structural(
                ".//button[.//img[contains(@src, 'Download.svg')]]",
                self.probe,
            ),
        ];
        for (tag, text) in [
            ("button", "下载绘图"),
            ("button", "下载"),
            ("a", "下载"),
            ("button", "Download"),
            ("button", "生成"),
            ("button", "Create"),
        ] {
            strategies.push(LocatorStrategy::text_in(tag, text, self.probe));
        }
        StrategyList::new("generate trigger", strategies)
    }

    /// Innermost elements whose text (or placeholder) mentions a field label
    pub fn field_label(&self, label: &str) -> StrategyList {
        let lit = xpath_literal(label);
        StrategyList::new(
            format!("label '{}'", label),
            vec![
                LocatorStrategy::structural(
                    format!(
                        ".//*[self::label or self::p or self::span or self::div]\
                         [contains(normalize-space(.), {lit})]\
                         [not(.//*[contains(normalize-space(.), {lit})])]"
                    ),
                    self.element,
                ),
                LocatorStrategy::structural(
                    format!(".//input[contains(@placeholder, {lit})]"),
                    self.probe,
                ),
            ],
        )
    }

    /// The form group enclosing a label element
    pub fn field_container(&self) -> StrategyList {
        StrategyList::new(
            "field container",
            vec![
                LocatorStrategy::structural(
                    "./ancestor::div[contains(@class, 'form-group') or contains(@class, 'field') \
                     or contains(@class, 'form-item')][1]",
                    self.probe,
                ),
                LocatorStrategy::structural("./parent::*", self.probe),
            ],
        )
    }

    /// Native `<select>` inside a field container
    pub fn native_choice(&self) -> StrategyList {
        StrategyList::new(
            "native select",
            vec![LocatorStrategy::css("select", self.probe)],
        )
    }

    /// Script-driven dropdown trigger inside a field container
    pub fn custom_choice(&self) -> StrategyList {
        StrategyList::new(
            "dropdown trigger",
            vec![
                LocatorStrategy::structural(
                    ".//*[@role='combobox' or @role='listbox' or @role='button']",
                    self.probe,
                ),
                LocatorStrategy::css("mat-select, ng-select, .dropdown-toggle", self.probe),
            ],
        )
    }

    /// Free-text control inside a field container
    pub fn text_input(&self) -> StrategyList {
        StrategyList::new(
            "text input",
            vec![LocatorStrategy::css(
                "input:not([type='hidden']):not([type='checkbox']):not([type='radio']), textarea",
                self.probe,
            )],
        )
    }

    /// An opened dropdown's entry whose text is exactly `value`
    pub fn choice_option(&self, value: &str) -> StrategyList {
        let lit = xpath_literal(value);
        StrategyList::new(
            format!("option '{}'", value),
            vec![
                LocatorStrategy::structural(format!(".//li[normalize-space(.)={lit}]"), self.element),
                LocatorStrategy::structural(
                    format!(".//*[contains(@class, 'option')][normalize-space(.)={lit}]"),
                    self.probe,
                ),
                LocatorStrategy::structural(
                    format!(".//option[normalize-space(.)={lit}]"),
                    self.probe,
                ),
            ],
        )
    }

    /// Every named target with example arguments, for display
    pub fn describe(&self) -> TableDescription {
        TableDescription {
            version: TABLE_VERSION,
            targets: vec![
                self.page_root(),
                self.product_collection(),
                self.product_card("<name>"),
                self.configure_trigger(),
                self.configurator_root(),
                self.field_label("<label>"),
                self.field_container(),
                self.native_choice(),
                self.custom_choice(),
                self.text_input(),
                self.choice_option("<value>"),
                self.generate_trigger(),
            ],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableDescription {
    pub version: u32,
    pub targets: Vec<StrategyList>,
}
