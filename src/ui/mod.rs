use std::fmt::{Display, Formatter};
use std::io::Write;
use std::time::{Duration, Instant};
use std::sync::mpsc::{channel, Sender};
use std::thread::JoinHandle;
#[cfg(feature = "buffered_out")]
use std::io::BufWriter;
#[cfg(feature = "branch-graphviz")]
use std::fs::OpenOptions;

use console::{pad_str_with, Alignment, style, pad_str};

/// Struct to hold the UI
/// Particulary the receiver channel
pub struct UI {
    sender: UISender,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct UISender {
    sender: Sender<UIUserMessage>,
}

impl UISender {
    /// Send typed UIMessage to internal channel
    pub fn send(&self, user_msg: UIUserMessage) {
        // a closed UI only loses log lines
        #[cfg(not(feature = "disable_ui"))]
        let _ = self.sender.send(user_msg);
    }

    /// Sender without a printing thread, all messages are dropped
    pub fn detached() -> Self {
        let (sender, _) = channel();
        UISender { sender }
    }

    pub fn warn(&self, msg: String) {
        self.send(UIUserMessage::Warning(msg));
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

impl UI {
    pub fn get_sender(&self) -> UISender {
        self.sender.clone()
    }

    pub fn new() -> Self {
        let (sender, receiver) = channel::<UIUserMessage>();

        #[cfg(not(feature = "disable_ui"))]
        let handle = Some(std::thread::spawn(move || {
            #[cfg(feature = "branch-graphviz")]
            let mut graphviz_branch_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open("/tmp/branching_tree.dot")
                .ok();

            #[cfg(feature = "branch-graphviz")]
            if let Some(file) = graphviz_branch_file.as_mut() {
                let _ = file.write(b"digraph {\n");
            }

            #[cfg(not(feature = "locked_out"))]
            let stdout = std::io::stdout();
            #[cfg(feature = "locked_out")]
            let stdout = std::io::stdout().lock();

            #[cfg(not(feature = "buffered_out"))]
            let mut buffered_out = stdout;
            #[cfg(feature = "buffered_out")]
            let mut buffered_out = BufWriter::with_capacity(512, stdout);

            let start_time = Instant::now();

            let mut total_pricing_runtime = 0.0;
            let mut total_lp_runtime = 0.0;
            let mut total_probing_runtime = 0.0;

            while let Ok(message) = receiver.recv() {
                let time = start_time.elapsed().as_secs_f64();
                match message {
                    UIUserMessage::NodeCut { node } => {
                        #[cfg(feature = "branch-graphviz")]
                        if let Some(file) = graphviz_branch_file.as_mut() {
                            let _ = file.write(format!("{} [style=\"filled\" fillcolor=\"lightyellow\"];\n", node).as_bytes());
                        }
                        let _ = writeln!(&mut buffered_out, "{}", style(format!("{time:>6.2} node {node} cut off")).dim());
                    }
                    UIUserMessage::TimeLimitReached => { let _ = writeln!(&mut buffered_out, "{}", style("Time Limit Reached").yellow().bold()); }
                    UIUserMessage::NodeLimitReached => { let _ = writeln!(&mut buffered_out, "{}", style("Node Limit Reached").yellow().bold()); }
                    UIUserMessage::Log(msg) => { let _ = writeln!(&mut buffered_out, "{:>6.2}  {}", time, msg); }
                    UIUserMessage::LogS(msg) => { let _ = writeln!(&mut buffered_out, "{:>6.2}  {}", time, msg); }
                    UIUserMessage::Warning(msg) => { let _ = writeln!(&mut buffered_out, "{:>6.2}  {} {}", time, style("warning:").yellow().bold(), msg); }

                    UIUserMessage::StartPhase(title) => {
                        let _ = writeln!(&mut buffered_out, "{}", pad_str_with("", 30, Alignment::Center, None, '⎯'));
                        let _ = writeln!(&mut buffered_out, "{}", style(pad_str(title, 30, Alignment::Center, None)).green());
                        let _ = writeln!(&mut buffered_out, "{}", "⎯".repeat(30));
                        let _ = buffered_out.flush();
                    }
                    UIUserMessage::ExitUi { root_node } => {
                        let final_time = start_time.elapsed().as_secs_f64();
                        let _ = writeln!(&mut buffered_out, "{}", pad_str_with("Statistics", 30, Alignment::Center, None, '⎯'));
                        let _ = writeln!(&mut buffered_out, "total_lp_time: {:>8.2}s / total_pricing_time: {:>8.2}s / total_probing_time: {:>8.2}s", total_lp_runtime, total_pricing_runtime, total_probing_runtime);
                        if let Some(root_node) = root_node {
                            let _ = writeln!(&mut buffered_out, "root node: {:>8.2}s", root_node.as_secs_f64());
                        }
                        let overhead = final_time - total_lp_runtime - total_pricing_runtime;
                        let _ = writeln!(&mut buffered_out, "'overhead': {:>8.2}s  ({:>3.1}%)", overhead, overhead / final_time.max(f64::EPSILON) * 100.0);
                        let _ = writeln!(&mut buffered_out, "{}", "⎯".repeat(30));
                        let _ = buffered_out.flush();
                        break;
                    }

                    UIUserMessage::NodeStart(node_state) => {
                        let _ = writeln!(&mut buffered_out, "{time:>6.2} started   node {node_state}");
                        let _ = buffered_out.flush();

                        #[cfg(feature = "branch-graphviz")]
                        if let Some(file) = graphviz_branch_file.as_mut() {
                            let _ = file.write(format!("{id} [shape=\"plaintext\" label=<<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\"><TR><TD>{id}</TD><TD>{before_obj:.2} → ?</TD><TD>{best_obj:.2}</TD></TR><TR><TD COLSPAN=\"3\">{decision}</TD></TR></TABLE>>];\n {parent} -> {id};\n",
                                                       id = node_state.node,
                                                       parent = node_state.parent,
                                                       before_obj = node_state.before_obj,
                                                       best_obj = node_state.best_obj,
                                                       decision = node_state.decision,
                            ).as_bytes());
                        }
                    }
                    UIUserMessage::NodeFinish(node_state) => {
                        let _ = writeln!(&mut buffered_out, "{time:>6.2} completed node {node_state}");
                    }

                    UIUserMessage::LPSolveIterationFinish(state) => {
                        total_lp_runtime += state.lp_runtime;
                        let _ = writeln!(&mut buffered_out, "{}", style(format!("{time:>6.2} lp iteration {state}")).dim());
                    }
                    UIUserMessage::PricingProblemFinish(state) => {
                        // always needed for statistics
                        total_pricing_runtime += state.runtime;
                        let _ = writeln!(&mut buffered_out, "{}", style(format!("{time:>6.2} pricing iteration {state}")).dim());
                    }
                    UIUserMessage::StrongBranchingPhase(state) => {
                        total_probing_runtime += state.runtime;
                        let _ = writeln!(&mut buffered_out, "{}", style(format!("{time:>6.2} strong branching {state}")).cyan());
                    }

                    UIUserMessage::NewBest { node, obj } => {
                        let _ = writeln!(&mut buffered_out, "{:>6.2}  {} {}", time, style("Has new best:").black().on_green().bold(), style(format!("{obj} at node {node}")).bold());
                        let _ = buffered_out.flush();

                        #[cfg(feature = "branch-graphviz")]
                        if let Some(file) = graphviz_branch_file.as_mut() {
                            let _ = file.write(format!("{id} [style=\"filled\" fillcolor=\"lightgreen\"];\n", id = node).as_bytes());
                        }
                    }
                }
            }

            #[cfg(feature = "branch-graphviz")]
            if let Some(file) = graphviz_branch_file.as_mut() {
                let _ = file.write(b"}\n");
            }
            let _ = buffered_out.flush();
        }));
        #[cfg(feature = "disable_ui")]
        let handle = {
            drop(receiver);
            None
        };

        Self {
            sender: UISender { sender },
            handle,
        }
    }

    /// Print the final statistics and wait for the printing thread
    pub fn finish(mut self, root_node: Option<Duration>) {
        self.sender.send(UIUserMessage::ExitUi { root_node });
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone)]
pub struct NodeUIState {
    pub node: u64,
    pub parent: u64,
    pub depth: usize,
    pub num_columns: usize,
    pub current_open: usize,
    pub decision: String,
    pub before_obj: f64,
    pub after_obj: Option<f64>, // not set in node start
    pub best_obj: f64,
}

impl Display for NodeUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{id}  parent=<{parent}> depth=<{depth}> open=<{current_open}> cols=<{num_columns}> decision=<{decision}> obj_before=<{before_obj}> obj_now=<{after_obj}> obj*=<{best_obj}>",
               id = self.node, parent = self.parent, depth = self.depth, current_open = self.current_open, num_columns = self.num_columns,
               decision = self.decision, before_obj = self.before_obj,
               after_obj = self.after_obj.map(|v| format!("{}", v)).unwrap_or_else(|| "-".to_string()), best_obj = self.best_obj
        )
    }
}

#[derive(Clone)]
/// Holds all state updates that can influence the UI
pub enum UIUserMessage {
    LogS(&'static str),
    Log(String),
    Warning(String),
    TimeLimitReached,
    NodeLimitReached,
    StartPhase(&'static str),
    ExitUi { root_node: Option<Duration> },

    NodeStart(NodeUIState),
    NodeFinish(NodeUIState),
    NodeCut { node: u64 },

    LPSolveIterationFinish(LPSolveIterationUIState),
    PricingProblemFinish(PricingProblemUIState),
    StrongBranchingPhase(StrongBranchingUIState),

    NewBest { obj: f64, node: u64 },
}

#[derive(Clone)]
pub struct PricingProblemUIState {
    pub runtime: f64,
    pub block: usize,
    pub num_columns: usize,
    pub dual_bound: f64,
}

impl Display for PricingProblemUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block=<{}> pricing_runtime=<{:>5.2}> num_cols=<{}> dual_bound=<{}>", self.block, self.runtime, self.num_columns, self.dual_bound)
    }
}

#[derive(Clone)]
pub struct LPSolveIterationUIState {
    pub obj: f64,
    pub best_dual_bound: Option<f64>,
    pub lp_runtime: f64,
    pub num_columns: usize,
    pub num_total_pool_columns: usize,
    pub previous_pricing_runtime: f64,
}

impl Display for LPSolveIterationUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj=<{:>10.8}> bound=<{}>: lp_runtime=<{:>5.2}> prev_pricing_runtime=<{:>5.2}> cols=<{}/{}>", self.obj, self.best_dual_bound.map(|db| format!("{:>10.8}", db)).unwrap_or("-".to_string()), self.lp_runtime, self.previous_pricing_runtime, self.num_columns, self.num_total_pool_columns)
    }
}

#[derive(Clone)]
pub struct StrongBranchingUIState {
    pub node: u64,
    pub phase: u8,
    pub num_in: usize,
    pub num_out: usize,
    pub runtime: f64,
}

impl Display for StrongBranchingUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node=<{}> phase=<{}> cands=<{} → {}> runtime=<{:>5.2}>", self.node, self.phase, self.num_in, self.num_out, self.runtime)
    }
}
