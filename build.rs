use std::{fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=aidl");
    println!("cargo:rerun-if-changed=build.rs");

    let mut aidl = rsbinder_aidl::Builder::new()
        .include_dir(PathBuf::from("aidl"))
        .output(PathBuf::from("aidl.rs"));

    let dirs = ["aidl/android/content/pm", "aidl/android/permission"];
    for dir in dirs {
        println!("Processing AIDL files in directory: {}", dir);
        let dir = fs::read_dir(dir).unwrap();

        for entry in dir {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("aidl") {
                aidl = aidl.source(path);
            }
        }
    }

    aidl.generate().unwrap();
}
