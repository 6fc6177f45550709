/// One pre-configured nmap invocation offered in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanDefinition {
    /// Menu key, also used for lookups.
    pub id: &'static str,
    pub name: &'static str,
    /// Program followed by its flags; the target is appended at run time.
    pub arguments: &'static [&'static str],
    pub description: &'static str,
}

impl ScanDefinition {
    /// Argument vector with the program replaced, e.g. by an explicit nmap path.
    pub fn arguments_with_program(&self, program: &str) -> Vec<String> {
        let mut args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
        if let Some(first) = args.first_mut() {
            *first = program.to_string();
        }
        args
    }

    pub fn command_line(&self) -> String {
        self.arguments.join(" ")
    }
}

const CATALOG: &[ScanDefinition] = &[
    ScanDefinition {
        id: "1",
        name: "Host Discovery (Ping Scan)",
        arguments: &["nmap", "-sn"],
        description: "Checks which hosts are alive without scanning ports.",
    },
    ScanDefinition {
        id: "2",
        name: "Quick Port Scan",
        arguments: &["nmap"],
        description: "Scans the most common 1000 TCP ports.",
    },
    ScanDefinition {
        id: "3",
        name: "Full Port Scan",
        arguments: &["nmap", "-p-"],
        description: "Scans all 65535 TCP ports.",
    },
    ScanDefinition {
        id: "4",
        name: "Service & Version Detection",
        arguments: &["nmap", "-sV", "-sC"],
        description: "Detects service versions and runs default scripts.",
    },
    ScanDefinition {
        id: "5",
        name: "OS Detection",
        arguments: &["nmap", "-O"],
        description: "Attempts to identify the target operating system.",
    },
    ScanDefinition {
        id: "6",
        name: "Stealth Mode (SYN Scan)",
        arguments: &["nmap", "-sS", "-Pn"],
        description: "Scans without completing TCP connections. (Usually requires sudo/root)",
    },
];

/// All scans in menu order.
pub fn list_scans() -> &'static [ScanDefinition] {
    CATALOG
}

/// Find a scan by its menu key. Unknown keys are not an error.
pub fn lookup_scan(id: &str) -> Option<&'static ScanDefinition> {
    CATALOG.iter().find(|s| s.id == id)
}
