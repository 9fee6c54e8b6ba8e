//! Word-list based fake value generator.

use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Christopher", "Lisa", "Daniel", "Nancy", "Matthew", "Betty", "Anthony",
    "Margaret", "Mark", "Sandra", "Donald", "Ashley", "Steven", "Kimberly", "Paul", "Emily",
    "Andrew", "Donna", "Joshua", "Michelle", "Kenneth", "Carol", "Kevin", "Amanda", "Brian",
    "Melissa", "George", "Deborah", "Timothy", "Stephanie", "Ronald", "Rebecca", "Jason", "Laura",
    "Edward", "Sharon", "Jeffrey", "Cynthia", "Ryan", "Kathleen", "Jacob", "Amy", "Gary", "Angela",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright", "Scott",
    "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall", "Rivera",
    "Campbell", "Mitchell", "Carter", "Roberts", "Gomez", "Phillips", "Evans", "Turner", "Diaz",
];

const EMAIL_DOMAINS: &[&str] = &[
    "example.com", "example.org", "example.net", "mail.test", "inbox.test",
];

const COLORS: &[&str] = &[
    "Red", "Blue", "Green", "Yellow", "Purple", "Orange", "Black", "White", "Silver", "Gold",
    "Teal", "Navy", "Maroon", "Olive", "Coral", "Indigo", "Ivory", "Khaki", "Lavender", "Salmon",
    "Crimson", "Turquoise", "Beige", "Chocolate", "Plum", "Orchid", "Tomato", "SeaGreen",
];

/// Lorem ipsum vocabulary for product names and descriptions.
const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in", "reprehenderit",
    "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur", "excepteur", "sint",
    "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui", "officia", "deserunt",
    "mollit", "anim", "id", "est", "laborum",
];

/// Days covered by "the last five years".
pub const FIVE_YEARS_DAYS: i64 = 5 * 365;

/// Fake value generator over a seedable RNG.
pub struct Faker {
    rng: StdRng,
    issued_emails: HashSet<String>,
}

impl Faker {
    /// Create a faker seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a deterministic faker.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    /// Seeded when `seed` is set, entropy otherwise.
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::new(),
        }
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            issued_emails: HashSet::new(),
        }
    }

    /// Underlying RNG for numeric draws.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Pick one element of a non-empty slice.
    pub fn choice<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    pub fn first_name(&mut self) -> String {
        self.choice(FIRST_NAMES).to_string()
    }

    pub fn last_name(&mut self) -> String {
        self.choice(LAST_NAMES).to_string()
    }

    /// "First Last".
    pub fn name(&mut self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    /// An email address; may repeat.
    pub fn email(&mut self) -> String {
        let first = self.choice(FIRST_NAMES).to_lowercase();
        let last = self.choice(LAST_NAMES).to_lowercase();
        let n: u32 = self.rng.gen_range(1..10_000);
        let domain = self.choice(EMAIL_DOMAINS);
        format!("{}.{}{}@{}", first, last, n, domain)
    }

    /// An email address never returned before by this faker.
    pub fn unique_email(&mut self) -> String {
        for _ in 0..16 {
            let email = self.email();
            if self.issued_emails.insert(email.clone()) {
                return email;
            }
        }

        // Dense space: disambiguate with the issue count.
        let base = self.email();
        let mut suffix = self.issued_emails.len();
        loop {
            let email = base.replacen('@', &format!(".{}@", suffix), 1);
            if self.issued_emails.insert(email.clone()) {
                return email;
            }
            suffix += 1;
        }
    }

    pub fn word(&mut self) -> String {
        self.choice(LOREM).to_string()
    }

    pub fn color_name(&mut self) -> String {
        self.choice(COLORS).to_string()
    }

    /// Lorem ipsum sentences no longer than `max_chars`.
    pub fn text(&mut self, max_chars: usize) -> String {
        let mut text = String::new();
        loop {
            let sentence = self.sentence();
            let needed = if text.is_empty() {
                sentence.len()
            } else {
                sentence.len() + 1
            };
            if text.len() + needed > max_chars {
                break;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&sentence);
        }

        if text.is_empty() {
            // Single truncated sentence when even one does not fit.
            let mut sentence = self.sentence();
            sentence.truncate(max_chars.saturating_sub(1));
            let trimmed = sentence.trim_end().to_string();
            if max_chars == 0 {
                return String::new();
            }
            return format!("{}.", trimmed);
        }
        text
    }

    fn sentence(&mut self) -> String {
        let len = self.rng.gen_range(4..=10);
        let words: Vec<&str> = (0..len).map(|_| self.choice(LOREM)).collect();
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }

    /// Uniform timestamp in `[start, end]`, second resolution.
    pub fn date_time_between(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> NaiveDateTime {
        let span = (end - start).num_seconds();
        if span <= 0 {
            return start;
        }
        start + Duration::seconds(self.rng.gen_range(0..=span))
    }

    /// Uniform timestamp within the last five years.
    pub fn recent_date_time(&mut self) -> NaiveDateTime {
        let now = now_utc();
        self.date_time_between(now - Duration::days(FIVE_YEARS_DAYS), now)
    }
}

impl Default for Faker {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC time without sub-second noise.
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now - Duration::nanoseconds(now.and_utc().timestamp_subsec_nanos() as i64)
}
