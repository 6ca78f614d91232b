// Scripted in-memory page used by unit tests in place of a WebDriver session

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::SessionError;
use crate::locator::{LocatorStrategy, Query};
use crate::session::{PageFingerprint, Session, SessionProvider};
use crate::targets::StrategyTable;

pub type NodeId = usize;

/// Something a click does to the page
#[derive(Debug, Clone)]
pub enum Effect {
    /// Attach and display a node
    Show(NodeId),
    /// Detach a node; later use of its handle is stale
    Remove(NodeId),
    /// Drop a file into the session's output directory after a delay
    WriteFile { name: String, after: Duration },
    /// Delete a file from the output directory after a delay
    DeleteFile { name: String, after: Duration },
    /// The click call never returns
    Hang,
    /// The click call panics
    Panic,
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub tag: String,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub attached: bool,
    pub displayed: bool,
    pub enabled: bool,
    pub appears_after: Duration,
    pub stale_clicks: u32,
    pub obstructed_checks: u32,
    pub value: String,
    pub swallows_input: bool,
    pub options: Vec<String>,
    pub on_click: Vec<Effect>,
}

impl FakeNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: String::new(),
            attrs: HashMap::new(),
            attached: true,
            displayed: true,
            enabled: true,
            appears_after: Duration::ZERO,
            stale_clicks: 0,
            obstructed_checks: 0,
            value: String::new(),
            swallows_input: false,
            options: Vec::new(),
            on_click: Vec::new(),
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn appears_after(mut self, after: Duration) -> Self {
        self.appears_after = after;
        self
    }

    pub fn stale_clicks(mut self, n: u32) -> Self {
        self.stale_clicks = n;
        self
    }

    pub fn obstructed(mut self, checks: u32) -> Self {
        self.obstructed_checks = checks;
        self
    }

    pub fn swallows_input(mut self) -> Self {
        self.swallows_input = true;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }
}

struct PageState {
    nodes: Vec<FakeNode>,
    answers: HashMap<(Option<NodeId>, Query), Vec<NodeId>>,
    url: String,
    version: u64,
    opened_at: Instant,
    output_dir: Option<PathBuf>,
    clicks: Vec<NodeId>,
    navigations: Vec<String>,
    navigate_error: Option<SessionError>,
    hang_navigation: bool,
    panic_navigation: bool,
    panic_quit: bool,
    quit_called: bool,
}

/// Clones share one page so tests can inspect it after the session is dropped
#[derive(Clone)]
pub struct FakeSession {
    state: Arc<Mutex<PageState>>,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                nodes: Vec::new(),
                answers: HashMap::new(),
                url: "about:blank".to_string(),
                version: 0,
                opened_at: Instant::now(),
                output_dir: None,
                clicks: Vec::new(),
                navigations: Vec::new(),
                navigate_error: None,
                hang_navigation: false,
                panic_navigation: false,
                panic_quit: false,
                quit_called: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, node: FakeNode) -> NodeId {
        let mut state = self.lock();
        state.nodes.push(node);
        state.nodes.len() - 1
    }

    /// Script the result of `query` searched within `scope`
    pub fn answer(&self, scope: Option<NodeId>, query: Query, ids: Vec<NodeId>) {
        self.lock().answers.insert((scope, query), ids);
    }

    pub fn answer_strategy(&self, scope: Option<NodeId>, strategy: &LocatorStrategy, ids: Vec<NodeId>) {
        self.answer(scope, strategy.query(), ids);
    }

    pub fn update(&self, id: NodeId, f: impl FnOnce(&mut FakeNode)) {
        f(&mut self.lock().nodes[id]);
    }

    pub fn fail_navigation(&self, err: SessionError) {
        self.lock().navigate_error = Some(err);
    }

    pub fn hang_navigation(&self) {
        self.lock().hang_navigation = true;
    }

    pub fn panic_on_navigation(&self) {
        self.lock().panic_navigation = true;
    }

    /// `quit` records the call, then panics
    pub fn panic_on_quit(&self) {
        self.lock().panic_quit = true;
    }

    pub fn set_output_dir(&self, dir: &Path) {
        self.lock().output_dir = Some(dir.to_path_buf());
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.lock().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn value_of(&self, id: NodeId) -> String {
        self.lock().nodes[id].value.clone()
    }

    pub fn quit_called(&self) -> bool {
        self.lock().quit_called
    }

    fn present(state: &PageState, id: NodeId) -> bool {
        let node = &state.nodes[id];
        node.attached && state.opened_at.elapsed() >= node.appears_after
    }

    fn live(&self, id: NodeId) -> Result<MutexGuard<'_, PageState>, SessionError> {
        let state = self.lock();
        if !state.nodes[id].attached {
            return Err(SessionError::Stale(format!(
                "stale element reference: node {} is not attached to the page",
                id
            )));
        }
        Ok(state)
    }
}

fn spawn_file_effect(dir: PathBuf, name: String, after: Duration, delete: bool) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let path = dir.join(name);
        if delete {
            let _ = std::fs::remove_file(path);
        } else {
            let _ = std::fs::write(path, b"artifact");
        }
    });
}

#[async_trait]
impl Session for FakeSession {
    type Handle = NodeId;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let (hang, panics) = {
            let mut state = self.lock();
            if let Some(err) = state.navigate_error.clone() {
                return Err(err);
            }
            state.navigations.push(url.to_string());
            state.url = url.to_string();
            state.version += 1;
            (state.hang_navigation, state.panic_navigation)
        };
        // Lock released first so the page stays inspectable
        if panics {
            panic!("scripted panic during navigation to {}", url);
        }
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn find_all(
        &self,
        query: &Query,
        scope: Option<&NodeId>,
    ) -> Result<Vec<NodeId>, SessionError> {
        let state = match scope {
            Some(id) => self.live(*id)?,
            None => self.lock(),
        };
        let ids = state
            .answers
            .get(&(scope.copied(), query.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter(|id| Self::present(&state, *id))
            .collect())
    }

    async fn is_displayed(&self, el: &NodeId) -> Result<bool, SessionError> {
        let state = self.live(*el)?;
        Ok(state.nodes[*el].displayed && Self::present(&state, *el))
    }

    async fn is_enabled(&self, el: &NodeId) -> Result<bool, SessionError> {
        Ok(self.live(*el)?.nodes[*el].enabled)
    }

    async fn is_clickable(&self, el: &NodeId) -> Result<bool, SessionError> {
        let mut state = self.live(*el)?;
        let node = &mut state.nodes[*el];
        if node.obstructed_checks > 0 {
            if node.obstructed_checks != u32::MAX {
                node.obstructed_checks -= 1;
            }
            return Ok(false);
        }
        Ok(true)
    }

    async fn scroll_into_view(&self, el: &NodeId) -> Result<(), SessionError> {
        self.live(*el).map(|_| ())
    }

    async fn click(&self, el: &NodeId) -> Result<(), SessionError> {
        let (hang, panics) = {
            let mut state = self.live(*el)?;
            if state.nodes[*el].stale_clicks > 0 {
                state.nodes[*el].stale_clicks -= 1;
                // The re-render replaced the node; the old handle is gone
                return Err(SessionError::Stale(
                    "stale element reference: element re-rendered".to_string(),
                ));
            }
            state.clicks.push(*el);
            state.version += 1;

            let mut hang = false;
            let mut panics = false;
            for effect in state.nodes[*el].on_click.clone() {
                match effect {
                    Effect::Show(id) => {
                        let node = &mut state.nodes[id];
                        node.attached = true;
                        node.displayed = true;
                        node.appears_after = Duration::ZERO;
                    }
                    Effect::Remove(id) => state.nodes[id].attached = false,
                    Effect::WriteFile { name, after } => {
                        if let Some(dir) = state.output_dir.clone() {
                            spawn_file_effect(dir, name, after, false);
                        }
                    }
                    Effect::DeleteFile { name, after } => {
                        if let Some(dir) = state.output_dir.clone() {
                            spawn_file_effect(dir, name, after, true);
                        }
                    }
                    Effect::Hang => hang = true,
                    Effect::Panic => panics = true,
                }
            }
            (hang, panics)
        };
        if panics {
            panic!("scripted panic during click on node {}", el);
        }
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn clear(&self, el: &NodeId) -> Result<(), SessionError> {
        self.live(*el)?.nodes[*el].value.clear();
        Ok(())
    }

    async fn type_text(&self, el: &NodeId, text: &str) -> Result<(), SessionError> {
        let mut state = self.live(*el)?;
        let node = &mut state.nodes[*el];
        if !node.swallows_input {
            node.value.push_str(text);
        }
        Ok(())
    }

    async fn select_by_label(&self, el: &NodeId, label: &str) -> Result<(), SessionError> {
        let mut state = self.live(*el)?;
        let node = &mut state.nodes[*el];
        if !node.options.iter().any(|o| o == label) {
            return Err(SessionError::Other(format!("no option labelled {}", label)));
        }
        node.value = label.to_string();
        Ok(())
    }

    async fn value(&self, el: &NodeId) -> Result<Option<String>, SessionError> {
        Ok(Some(self.live(*el)?.nodes[*el].value.clone()))
    }

    async fn text(&self, el: &NodeId) -> Result<String, SessionError> {
        Ok(self.live(*el)?.nodes[*el].text.clone())
    }

    async fn attr(&self, el: &NodeId, name: &str) -> Result<Option<String>, SessionError> {
        Ok(self.live(*el)?.nodes[*el].attrs.get(name).cloned())
    }

    async fn fingerprint(&self) -> Result<PageFingerprint, SessionError> {
        let state = self.lock();
        Ok(PageFingerprint {
            url: state.url.clone(),
            node_count: state.version,
        })
    }

    async fn quit(&mut self) -> Result<(), SessionError> {
        let panics = {
            let mut state = self.lock();
            state.quit_called = true;
            state.panic_quit
        };
        if panics {
            panic!("scripted panic during quit");
        }
        Ok(())
    }
}

/// Hands out pre-scripted sessions in order, one per `open`
#[derive(Default)]
pub struct FakeProvider {
    queue: Mutex<VecDeque<Result<FakeSession, SessionError>>>,
    opened: Mutex<Vec<FakeSession>>,
    panicking_opens: Mutex<u32>,
    open_delay: Mutex<Duration>,
}

impl FakeProvider {
    pub fn new(sessions: Vec<FakeSession>) -> Self {
        Self {
            queue: Mutex::new(sessions.into_iter().map(Ok).collect()),
            opened: Mutex::new(Vec::new()),
            panicking_opens: Mutex::new(0),
            open_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Every `open` takes this long before answering
    pub fn delay_open(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    /// The next `count` calls to `open` panic before taking a session
    pub fn panic_on_open(&self, count: u32) {
        *self.panicking_opens.lock().unwrap() = count;
    }

    pub fn push_error(&self, err: SessionError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn opened(&self) -> Vec<FakeSession> {
        self.opened.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    async fn open(&self, output_dir: &Path) -> Result<FakeSession, SessionError> {
        let panics = {
            let mut remaining = self.panicking_opens.lock().unwrap();
            let panics = *remaining > 0;
            *remaining = remaining.saturating_sub(1);
            panics
        };
        if panics {
            panic!("scripted panic while opening a session");
        }
        let delay = *self.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.queue.lock().unwrap().pop_front();
        let session = next.unwrap_or_else(|| {
            Err(SessionError::Unresponsive("no scripted session left".to_string()))
        })?;
        session.set_output_dir(output_dir);
        self.opened.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// How a scripted specification field is built
#[derive(Debug, Clone)]
pub enum FieldScript {
    Text,
    Native(Vec<&'static str>),
    Dropdown(Vec<&'static str>),
    /// Label exists but nothing fillable sits next to it
    Bare,
}

/// How the generate click ends
#[derive(Debug, Clone)]
pub enum Finish {
    /// Final file lands after the delay
    Download(&'static str, Duration),
    /// `.crdownload` appears, the final file follows, then the partial is removed
    Staged(&'static str, Duration, Duration, Duration),
    /// Click works but nothing is ever saved
    NoDownload,
}

/// Node ids of a scripted product flow
#[derive(Debug, Clone, Default)]
pub struct FlowNodes {
    pub root: NodeId,
    pub collection: NodeId,
    pub card: NodeId,
    pub configure: NodeId,
    pub shell: NodeId,
    pub generate: NodeId,
    pub fields: HashMap<String, NodeId>,
}

/// A complete happy-path page for one product, answering the first strategy
/// of every target in `table`
pub fn scripted_flow(
    table: &StrategyTable,
    product: &str,
    fields: &[(&str, FieldScript)],
    finish: Finish,
) -> (FakeSession, FlowNodes) {
    let page = FakeSession::new();
    let mut nodes = FlowNodes {
        root: page.add(FakeNode::new("iaa-root")),
        ..FlowNodes::default()
    };
    page.answer_strategy(None, &table.page_root().strategies[0], vec![nodes.root]);

    nodes.shell = page.add(FakeNode::new("iaa-dimensions-shell").detached());
    page.answer_strategy(None, &table.configurator_root().strategies[0], vec![nodes.shell]);

    nodes.collection = page.add(FakeNode::new("iaa-product-listing"));
    page.answer_strategy(None, &table.product_collection().strategies[0], vec![nodes.collection]);

    nodes.card = page.add(FakeNode::new("div").attr("class", "product-card").text(product));
    page.answer_strategy(
        Some(nodes.collection),
        &table.product_card(product).strategies[0],
        vec![nodes.card],
    );

    nodes.configure = page.add(
        FakeNode::new("a")
            .attr("id", "create")
            .on_click(Effect::Show(nodes.shell)),
    );
    page.answer_strategy(
        Some(nodes.card),
        &table.configure_trigger().strategies[0],
        vec![nodes.configure],
    );

    for (label, script) in fields {
        let label_node = page.add(FakeNode::new("label").text(label));
        page.answer_strategy(None, &table.field_label(label).strategies[0], vec![label_node]);
        let container = page.add(FakeNode::new("div").attr("class", "form-group"));
        page.answer_strategy(
            Some(label_node),
            &table.field_container().strategies[0],
            vec![container],
        );

        let control = match script {
            FieldScript::Text => {
                let input = page.add(FakeNode::new("input"));
                page.answer_strategy(Some(container), &table.text_input().strategies[0], vec![input]);
                Some(input)
            }
            FieldScript::Native(options) => {
                let select = page.add(FakeNode::new("select").options(options));
                page.answer_strategy(
                    Some(container),
                    &table.native_choice().strategies[0],
                    vec![select],
                );
                Some(select)
            }
            FieldScript::Dropdown(options) => {
                let mut option_ids = Vec::new();
                for option in options {
                    let id = page.add(FakeNode::new("li").text(option).detached());
                    page.answer_strategy(None, &table.choice_option(option).strategies[0], vec![id]);
                    option_ids.push(id);
                }
                let mut trigger = FakeNode::new("div").attr("role", "combobox");
                for id in option_ids {
                    trigger = trigger.on_click(Effect::Show(id));
                }
                let trigger = page.add(trigger);
                page.answer_strategy(
                    Some(container),
                    &table.custom_choice().strategies[0],
                    vec![trigger],
                );
                Some(trigger)
            }
            FieldScript::Bare => None,
        };
        if let Some(control) = control {
            nodes.fields.insert(label.to_string(), control);
        }
    }

    let mut button = FakeNode::new("button").attr("class", "btn-download");
    match finish {
        Finish::Download(name, after) => {
            button = button.on_click(Effect::WriteFile {
                name: name.to_string(),
                after,
            });
        }
        Finish::Staged(name, partial_at, final_at, partial_gone_at) => {
            let partial = format!("{}.crdownload", name);
            button = button
                .on_click(Effect::WriteFile {
                    name: partial.clone(),
                    after: partial_at,
                })
                .on_click(Effect::WriteFile {
                    name: name.to_string(),
                    after: final_at,
                })
                .on_click(Effect::DeleteFile {
                    name: partial,
                    after: partial_gone_at,
                });
        }
        Finish::NoDownload => {}
    }
    nodes.generate = page.add(button);
    page.answer_strategy(None, &table.generate_trigger().strategies[0], vec![nodes.generate]);

    (page, nodes)
}

/// A page whose root marker never appears
pub fn blank_page() -> FakeSession {
    FakeSession::new()
}
