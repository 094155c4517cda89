// src/manifest/catalog.rs

//! Built-in catalog for small-business workstations

use super::{Group, InstallItem, Manifest, PathCheck, PathCheckKind};
use std::path::PathBuf;

/// Root of the scaffolded business workspace
pub const WORKSPACE_ROOT: &str = "~/Business";

const WORKSPACE_DIRS: &[&str] = &[
    "Documents",
    "Invoices",
    "Receipts",
    "Contracts",
    "Templates",
    "Backups",
];

fn group(name: &str, description: &str, items: Vec<InstallItem>, paths: &[&str]) -> Group {
    Group {
        name: name.to_string(),
        description: description.to_string(),
        items,
        paths: paths.iter().map(PathBuf::from).collect(),
    }
}

fn path_check(name: &str, path: &str, kind: PathCheckKind, critical: bool) -> PathCheck {
    PathCheck {
        name: name.to_string(),
        path: PathBuf::from(path),
        kind,
        critical,
    }
}

/// Unexpanded catalog; `Manifest::builtin` expands `~`
pub(super) fn builtin() -> Manifest {
    let groups = vec![
        group(
            "office",
            "Office suite, mail and document tools",
            vec![
                InstallItem::primary("libreoffice", "LibreOffice", true),
                InstallItem::primary("thunderbird", "Thunderbird", true),
                InstallItem::primary("evince", "Document Viewer", false),
                InstallItem::primary("simple-scan", "Document Scanner", false),
            ],
            &["~/.config/libreoffice", "~/.thunderbird"],
        ),
        group(
            "communication",
            "Chat and video conferencing",
            vec![
                InstallItem::secondary("us.zoom.Zoom", "Zoom", true),
                InstallItem::secondary("com.slack.Slack", "Slack", false),
                InstallItem::secondary("org.signal.Signal", "Signal", false),
                InstallItem::primary("remmina", "Remmina", false),
            ],
            &["~/.var/app/com.slack.Slack", "~/.var/app/org.signal.Signal"],
        ),
        group(
            "finance",
            "Accounting and budgeting",
            vec![
                InstallItem::primary("gnucash", "GnuCash", true),
                InstallItem::primary("homebank", "HomeBank", false),
            ],
            &["~/.local/share/gnucash", "~/.config/homebank"],
        ),
        group(
            "creative",
            "Graphics, layout and publishing",
            vec![
                InstallItem::primary("gimp", "GIMP", false),
                InstallItem::primary("inkscape", "Inkscape", false),
                InstallItem::primary("scribus", "Scribus", false),
                InstallItem::secondary("org.kde.krita", "Krita", false),
            ],
            &["~/.config/GIMP", "~/.config/inkscape"],
        ),
        group(
            "security",
            "Antivirus, firewall and password management",
            vec![
                InstallItem::primary("clamav", "ClamAV", true),
                InstallItem::primary("ufw", "Uncomplicated Firewall", true),
                InstallItem::primary("keepassxc", "KeePassXC", true),
                InstallItem::secondary("com.bitwarden.desktop", "Bitwarden", false),
            ],
            &["~/.config/keepassxc"],
        ),
        group(
            "utilities",
            "Media, archiving and system tools",
            vec![
                InstallItem::primary("vlc", "VLC", false),
                InstallItem::primary("p7zip-full", "7-Zip", false),
                InstallItem::primary("htop", "htop", false),
                InstallItem::primary("flameshot", "Flameshot", false),
            ],
            &[],
        ),
    ];

    let mut path_checks = vec![
        path_check("LibreOffice launcher", "/usr/bin/libreoffice", PathCheckKind::Executable, true),
        path_check("GnuCash launcher", "/usr/bin/gnucash", PathCheckKind::Executable, true),
        path_check("ClamAV scanner", "/usr/bin/clamscan", PathCheckKind::Executable, true),
        path_check("Firewall tool", "/usr/sbin/ufw", PathCheckKind::Executable, true),
    ];
    path_checks.extend(WORKSPACE_DIRS.iter().map(|dir| {
        path_check(
            &format!("Workspace {}", dir),
            &format!("{}/{}", WORKSPACE_ROOT, dir),
            PathCheckKind::Exists,
            false,
        )
    }));

    Manifest {
        groups,
        path_checks,
        quick_checks: vec![
            InstallItem::primary("libreoffice", "LibreOffice", true),
            InstallItem::primary("thunderbird", "Thunderbird", true),
            InstallItem::primary("gnucash", "GnuCash", true),
            InstallItem::primary("clamav", "ClamAV", true),
            InstallItem::secondary("us.zoom.Zoom", "Zoom", true),
        ],
        workspace: WORKSPACE_DIRS
            .iter()
            .map(|dir| PathBuf::from(format!("{}/{}", WORKSPACE_ROOT, dir)))
            .collect(),
        data_dirs: vec![PathBuf::from(WORKSPACE_ROOT)],
    }
}
