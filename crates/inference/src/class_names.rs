//! Display names for the lost-and-found detection model.

pub const UNKNOWN_LABEL: &str = "Unknown";

/// Index order matches the training labels. "Wallet" sits at both 16 and 22.
const LOST_AND_FOUND_NAMES: [&str; 24] = [
    "Airpods",
    "Backpack",
    "Calculator",
    "Cap",
    "Eyeglasses",
    "Flash-drive",
    "Handbag",
    "Headphone",
    "Helmet",
    "Key",
    "Laptop",
    "Laptop Bag",
    "Phone Charger",
    "Powerbank",
    "Sling bag",
    "Smart Watch",
    "Wallet",
    "Smartphone",
    "Tablet",
    "Totebag",
    "Tumbler",
    "Umbrella",
    "Wallet",
    "Watch",
];

/// Fixed class-index to display-name mapping.
#[derive(Debug, Clone, Copy)]
pub struct ClassNameTable {
    names: &'static [&'static str],
}

impl ClassNameTable {
    pub const LOST_AND_FOUND: ClassNameTable = ClassNameTable {
        names: &LOST_AND_FOUND_NAMES,
    };

    pub fn name(&self, class_index: usize) -> Option<&'static str> {
        self.names.get(class_index).copied()
    }

    /// Like [`Self::name`] but renders unmapped indices as `"Unknown"`.
    pub fn label(&self, class_index: usize) -> &'static str {
        self.name(class_index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ClassNameTable {
    fn default() -> Self {
        Self::LOST_AND_FOUND
    }
}
