/// One benchmark input: a request body and the size class it belongs to.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    fixture: Fixture,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, fixture: Fixture) -> Self {
        Self { name, group, fixture }
    }

    pub fn small(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Small, fixture)
    }

    pub fn large(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Large, fixture)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn len(&self) -> usize {
        self.fixture.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixture.body.is_empty()
    }
}

/// A request body kept under `resources/` together with its content type.
#[derive(Debug, Copy, Clone)]
pub struct Fixture {
    file_name: &'static str,
    content_type: &'static str,
    body: &'static str,
}

impl Fixture {
    pub const fn json(file_name: &'static str, body: &'static str) -> Self {
        Self { file_name, content_type: "application/json", body }
    }

    pub const fn new(file_name: &'static str, content_type: &'static str, body: &'static str) -> Self {
        Self { file_name, content_type, body }
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn body(&self) -> &'static str {
        self.body
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestGroup {
    Small,
    Large,
}
