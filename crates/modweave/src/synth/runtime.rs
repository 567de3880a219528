//! Runtime support emitted at the top of every script.
//!
//! All mutable script state lives in one `__state` record. The `game` helper
//! object is built over that record and teardown walks it, so nothing the
//! script installs is tracked anywhere else.

use strum::IntoEnumIterator;

use crate::declaration::is_identifier;
use crate::table::VarType;

const STATE: &str = r#"'use strict';

const __state = {
    moduleBases: {},
    functions: {},
    attachedHooks: [],
    replacedFunctions: [],
    patchedInstructions: {},
    loopTimers: [],
};"#;

const SUPPORT: &str = r#"function __offset(value) {
    return typeof value === 'string' ? parseInt(value, 16) : value;
}

function __createRuntime(state) {
    const game = {
        resolveAddress(moduleName, offset, pointer) {
            const base = state.moduleBases[moduleName];
            if (!base) return null;
            let addr = base.add(offset);
            if (pointer !== undefined && pointer !== null) {
                addr = addr.readPointer().add(pointer);
            }
            return addr;
        },

        _resolveVar(moduleName, name) {
            const mod = memoryAddresses[moduleName];
            if (!mod || !mod.variables || !mod.variables[name]) {
                throw new Error('Variable not found: ' + moduleName + '.' + name);
            }
            const def = mod.variables[name];
            const pointer = def.Pointer !== undefined ? __offset(def.Pointer) : null;
            const addr = game.resolveAddress(moduleName, __offset(def.Address), pointer);
            if (!addr) throw new Error('Module not loaded: ' + moduleName);
            return { def, addr };
        },

        readVar(moduleName, name) {
            const { def, addr } = game._resolveVar(moduleName, name);
            if (def.Type === 'Block') {
                return addr.readByteArray(__offset(def.Size));
            }
            const typeInfo = TYPE_MAP[def.Type];
            if (!typeInfo) throw new Error('Unknown type: ' + def.Type);
            return addr[typeInfo.read]();
        },

        writeVar(moduleName, name, value) {
            const { def, addr } = game._resolveVar(moduleName, name);
            if (def.Type === 'Block') {
                addr.writeByteArray(value);
                return;
            }
            const typeInfo = TYPE_MAP[def.Type];
            if (!typeInfo) throw new Error('Unknown type: ' + def.Type);
            addr[typeInfo.write](value);
        },

        getVarPtr(moduleName, name) {
            return game._resolveVar(moduleName, name).addr;
        },

        readMemory(address, type) {
            const typeInfo = TYPE_MAP[type];
            if (!typeInfo || !typeInfo.read) throw new Error('Unknown type: ' + type);
            return ptr(address)[typeInfo.read]();
        },

        writeMemory(address, type, value) {
            const typeInfo = TYPE_MAP[type];
            if (!typeInfo || !typeInfo.write) throw new Error('Unknown type: ' + type);
            ptr(address)[typeInfo.write](value);
        },

        alloc(size) {
            return Memory.alloc(size);
        },

        allocString(str) {
            return Memory.allocUtf8String(str);
        },

        registerFunction(moduleName, name, offset, returnType, paramTypes) {
            const base = state.moduleBases[moduleName];
            if (!base) throw new Error('Module not loaded: ' + moduleName);
            if (!state.functions[moduleName]) state.functions[moduleName] = {};
            const addr = base.add(__offset(offset));
            state.functions[moduleName][name] = new NativeFunction(addr, returnType, paramTypes);
        },

        callFunction(moduleName, name, ...args) {
            const fns = state.functions[moduleName];
            if (!fns || !fns[name]) {
                throw new Error('Function not registered: ' + moduleName + '.' + name);
            }
            return fns[name](...args);
        },

        hasFunction(moduleName, name) {
            return !!(state.functions[moduleName] && state.functions[moduleName][name]);
        },

        get executable() {
            return manifest.executable;
        },

        isModuleSupported(moduleName) {
            return _supportedModules.indexOf(moduleName) !== -1;
        },

        get module() {
            const version = game.readVar(game.executable, 'GameVersion');
            const modules = Object.keys(manifest.modules);
            if (version >= 0 && version < modules.length) {
                return modules[version];
            }
            return null;
        },

        deleteInstruction(moduleName, address, size) {
            const base = state.moduleBases[moduleName];
            if (!base) throw new Error('Module not loaded: ' + moduleName);
            const addr = base.add(__offset(address));
            const key = addr.toString();
            if (state.patchedInstructions[key]) return;
            const backup = addr.readByteArray(size);
            Memory.protect(addr, size, 'rwx');
            const nops = new Uint8Array(size);
            nops.fill(0x90);
            addr.writeByteArray(nops.buffer);
            state.patchedInstructions[key] = { addr, size, backup };
        },

        restoreInstructions() {
            for (const key of Object.keys(state.patchedInstructions)) {
                const { addr, size, backup } = state.patchedInstructions[key];
                Memory.protect(addr, size, 'rwx');
                addr.writeByteArray(backup);
                delete state.patchedInstructions[key];
            }
        },

        cleanupHooks() {
            for (const hook of state.attachedHooks) {
                hook.detach();
            }
            state.attachedHooks.length = 0;
            for (const addr of state.replacedFunctions) {
                Interceptor.revert(addr);
            }
            state.replacedFunctions.length = 0;
        },

        cancelLoops() {
            for (const id of state.loopTimers) {
                if (id !== null) clearTimeout(id);
            }
            state.loopTimers.length = 0;
        },

        delay(ms) {
            return new Promise(resolve => setTimeout(resolve, ms));
        },
    };
    return game;
}

const game = __createRuntime(__state);

function __emitLog(level, args) {
    const message = args.join(' ');
    send({ event: '__log', data: { level, message } });
    return message;
}

function log(...args) {
    console.log(__emitLog('info', args));
}

function warn(...args) {
    console.warn(__emitLog('warning', args));
}

function error(...args) {
    console.error(__emitLog('error', args));
}

function __teardown(state) {
    if (typeof __modExit === 'function') {
        try { __modExit(); } catch (e) { error('Exit error:', e.stack); }
    }
    game.cancelLoops();
    game.cleanupHooks();
    game.restoreInstructions();
    state.functions = {};
}

recv('cleanup', function () {
    __teardown(__state);
    send({ event: '__cleanupDone' });
});"#;

/// Engine accessor names for one variable type, `None` for raw blocks.
fn accessors(kind: VarType) -> Option<(&'static str, &'static str)> {
    let pair = match kind {
        VarType::Int8 => ("readS8", "writeS8"),
        VarType::UInt8 => ("readU8", "writeU8"),
        VarType::Int16 => ("readS16", "writeS16"),
        VarType::UInt16 => ("readU16", "writeU16"),
        VarType::Int32 => ("readS32", "writeS32"),
        VarType::UInt32 => ("readU32", "writeU32"),
        VarType::Int64 => ("readS64", "writeS64"),
        VarType::UInt64 => ("readU64", "writeU64"),
        VarType::Float => ("readFloat", "writeFloat"),
        VarType::Double => ("readDouble", "writeDouble"),
        VarType::Pointer => ("readPointer", "writePointer"),
        VarType::Utf8String => ("readUtf8String", "writeUtf8String"),
        VarType::Utf16String => ("readUtf16String", "writeUtf16String"),
        VarType::AnsiString => ("readAnsiString", "writeAnsiString"),
        VarType::Block => return None,
    };
    Some(pair)
}

fn type_map() -> String {
    let mut output = String::from("const TYPE_MAP = {\n");
    for kind in VarType::iter() {
        let size = match kind {
            VarType::Pointer => "Process.pointerSize".to_string(),
            _ => kind.width().unwrap_or(0).to_string(),
        };
        let entry = match accessors(kind) {
            Some((read, write)) => format!(
                "    '{}': {{ read: '{}', write: '{}', size: {} }},\n",
                kind, read, write, size
            ),
            None => format!(
                "    '{}': {{ read: null, write: null, size: {} }},\n",
                kind, size
            ),
        };
        output.push_str(&entry);
    }
    output.push_str("};");
    output
}

/// Top-level bindings of the script plus the engine globals it calls.
const RESERVED_NAMES: &[&str] = &[
    "__state",
    "TYPE_MAP",
    "__offset",
    "__createRuntime",
    "game",
    "__emitLog",
    "log",
    "warn",
    "error",
    "__teardown",
    "manifest",
    "_supportedModules",
    "memoryAddresses",
    "__init",
    "__registerFunctions",
    "__installHooks",
    "__installLoops",
    "__installNops",
    "__modExit",
    "Module",
    "Process",
    "Memory",
    "Interceptor",
    "NativeCallback",
    "NativeFunction",
    "ptr",
    "int64",
    "uint64",
    "send",
    "recv",
    "setTimeout",
    "clearTimeout",
    "console",
    "parseInt",
    "Promise",
    "Uint8Array",
    "Object",
    "Array",
    "String",
    "Error",
    "undefined",
    "NaN",
    "Infinity",
];

const KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "arguments",
    "eval",
];

/// Whether `name` can be emitted as a top-level `const` of the script.
pub(crate) fn is_valid_constant_name(name: &str) -> bool {
    is_identifier(name) && !RESERVED_NAMES.contains(&name) && !KEYWORDS.contains(&name)
}

/// The runtime support block. Identical for every mod.
pub fn runtime_source() -> String {
    [STATE, type_map().as_str(), SUPPORT].join("\n\n")
}
